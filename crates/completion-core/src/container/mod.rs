//! Per-context and per-principal completion containers.
//!
//! - [`CompletableItemContainer`]: which items a context requires or treats
//!   as optional.
//! - [`CompletedItemContainer`]: principal id -> [`PrincipalCompletedItemContainer`].
//! - [`PrincipalCompletedItemContainer`]: item ntiid -> [`crate::model::CompletedItem`].
//!
//! All keys are case-insensitive. Containers are plain data; the engine is
//! responsible for emitting add/remove events around mutations it makes.

pub mod completable;
pub mod completed;

pub use completable::CompletableItemContainer;
pub use completed::{CompletedItemContainer, PrincipalCompletedItemContainer};
