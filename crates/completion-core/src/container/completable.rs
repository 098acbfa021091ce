use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{ItemKey, Ntiid};

/// Required/optional designations for one completion context.
///
/// The two sides are disjoint: designating an item on one side first drops
/// it from the other. Keys are case-insensitive; values keep the original
/// ntiid spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletableItemContainer {
    required: BTreeMap<String, Ntiid>,
    optional: BTreeMap<String, Ntiid>,
}

impl CompletableItemContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an item required, removing any optional designation.
    pub fn add_required_item(&mut self, item: &impl ItemKey) {
        self.remove_optional_item(item);
        self.required
            .insert(item.item_key(), Ntiid::new(item.item_ntiid()));
    }

    pub fn remove_required_item(&mut self, item: &impl ItemKey) -> bool {
        self.required.remove(&item.item_key()).is_some()
    }

    /// Mark an item optional, removing any required designation.
    pub fn add_optional_item(&mut self, item: &impl ItemKey) {
        self.remove_required_item(item);
        self.optional
            .insert(item.item_key(), Ntiid::new(item.item_ntiid()));
    }

    pub fn remove_optional_item(&mut self, item: &impl ItemKey) -> bool {
        self.optional.remove(&item.item_key()).is_some()
    }

    #[must_use]
    pub fn is_item_required(&self, item: &impl ItemKey) -> bool {
        self.required.contains_key(&item.item_key())
    }

    #[must_use]
    pub fn is_item_optional(&self, item: &impl ItemKey) -> bool {
        self.optional.contains_key(&item.item_key())
    }

    #[must_use]
    pub fn get_required_item_count(&self) -> usize {
        self.required.len()
    }

    #[must_use]
    pub fn get_optional_item_count(&self) -> usize {
        self.optional.len()
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &Ntiid> {
        self.required.values()
    }

    pub fn optional_keys(&self) -> impl Iterator<Item = &Ntiid> {
        self.optional.values()
    }

    pub fn clear(&mut self) {
        self.required.clear();
        self.optional.clear();
    }
}
