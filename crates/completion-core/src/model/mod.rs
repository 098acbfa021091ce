pub mod completed;
pub mod ids;
pub mod item;
pub mod progress;

use serde::{Deserialize, Serialize};

pub use completed::{Award, CompletedItem};
pub use ids::{ItemKey, Ntiid, PrincipalId, PrincipalResolver, container_key};
pub use item::{CompletableItem, ItemCatalog, ItemResolver};
pub use progress::{CompletionContextProgress, Progress};

/// An aggregate (e.g. a course) completed by completing its items.
///
/// A context is itself completable, so it carries the same identity pair as
/// a [`CompletableItem`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionContext {
    pub ntiid: Ntiid,
    pub mime_type: String,
}

impl CompletionContext {
    #[must_use]
    pub fn new(ntiid: impl Into<Ntiid>, mime_type: impl Into<String>) -> Self {
        Self {
            ntiid: ntiid.into(),
            mime_type: mime_type.into(),
        }
    }

    /// The context viewed as a completable item.
    #[must_use]
    pub fn as_item(&self) -> CompletableItem {
        CompletableItem::new(self.ntiid.clone(), self.mime_type.clone())
    }
}

impl ItemKey for CompletionContext {
    fn item_ntiid(&self) -> &str {
        self.ntiid.as_str()
    }
}
