use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use super::ids::{ItemKey, Ntiid, container_key};

/// A unit of content that can be marked done.
///
/// Owned by the content platform; this crate only ever holds weak handles to
/// live items plus their cached identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletableItem {
    pub ntiid: Ntiid,
    pub mime_type: String,
}

impl CompletableItem {
    #[must_use]
    pub fn new(ntiid: impl Into<Ntiid>, mime_type: impl Into<String>) -> Self {
        Self {
            ntiid: ntiid.into(),
            mime_type: mime_type.into(),
        }
    }
}

impl ItemKey for CompletableItem {
    fn item_ntiid(&self) -> &str {
        self.ntiid.as_str()
    }
}

/// Lookup of live completable items by ntiid.
///
/// "Not found" is a normal answer: items may be deleted while completion
/// records referring to them survive.
pub trait ItemResolver {
    fn resolve(&self, ntiid: &str) -> Option<Arc<CompletableItem>>;
}

/// In-memory registry of live items, held weakly.
#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: RwLock<BTreeMap<String, Weak<CompletableItem>>>,
}

impl ItemCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live item. Re-registering an ntiid replaces the handle.
    pub fn register(&self, item: &Arc<CompletableItem>) {
        let mut items = self
            .items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        items.insert(item.item_key(), Arc::downgrade(item));
    }

    pub fn unregister(&self, item: &impl ItemKey) -> bool {
        let mut items = self
            .items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        items.remove(&item.item_key()).is_some()
    }

    /// All items that are still alive, in key order. Dead handles are pruned.
    pub fn live_items(&self) -> Vec<Arc<CompletableItem>> {
        let mut items = self
            .items
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        items.retain(|_, handle| handle.strong_count() > 0);
        items.values().filter_map(Weak::upgrade).collect()
    }
}

impl ItemResolver for ItemCatalog {
    fn resolve(&self, ntiid: &str) -> Option<Arc<CompletableItem>> {
        let items = self
            .items
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        items.get(&container_key(ntiid)).and_then(Weak::upgrade)
    }
}
