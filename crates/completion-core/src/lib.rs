//! completion-core library.
//!
//! Tracks which completable items each principal has finished within a
//! completion context, reconciles that state against fresh progress under a
//! pluggable policy, and emits events when it changes.
//!
//! # Conventions
//!
//! - **Errors**: library operations return `Result<T, CompletionError>`;
//!   config loading uses `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).
//! - **Keys**: item, principal, and context keys are case-insensitive.

pub mod aggregate;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod policy;
pub mod provider;
pub mod query;
pub mod store;

pub use aggregate::{ContextCompletion, context_progress};
pub use config::{CompletionConfig, load_config};
pub use container::{
    CompletableItemContainer, CompletedItemContainer, PrincipalCompletedItemContainer,
};
pub use engine::{
    ProgressRemovedOutcome, ReconcileOutcome, Reconciler, RemoveOutcome, Transition,
    get_completed_item, is_item_required,
};
pub use error::{CompletionError, ErrorCode};
pub use event::{CompletionEvent, EventBus, EventSink, NullSink, RecordingSink};
pub use model::{
    Award, CompletableItem, CompletedItem, CompletionContext, CompletionContextProgress,
    ItemCatalog, ItemKey, ItemResolver, Ntiid, PrincipalId, PrincipalResolver, Progress,
};
pub use policy::{
    AggregateCompletionPolicy, CompletionPolicy, DefaultRequiredPolicy, PolicyContainer,
    PolicyProvider, PolicyRegistry,
};
pub use provider::{
    CompletableItemProvider, CompletedItemProvider, CompletionContextProvider,
    DefaultRequiredItemProvider, InMemoryProgress, ItemProviderRegistry, ProgressProvider,
    ProgressRegistry,
};
pub use query::CompletedItemQuery;
pub use store::{ContextContainers, ContextStore, InMemoryContextStore};
