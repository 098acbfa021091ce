use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::CompletionError;
use crate::model::{CompletedItem, ItemKey, PrincipalId};

/// Completed items of one principal within one completion context, keyed by
/// item ntiid (case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalCompletedItemContainer {
    principal: PrincipalId,
    items: BTreeMap<String, CompletedItem>,
    /// First successful completion of the context itself. Only used to
    /// broadcast context completion once; not the live completion state.
    context_completed_item: Option<CompletedItem>,
}

impl PrincipalCompletedItemContainer {
    #[must_use]
    pub const fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            items: BTreeMap::new(),
            context_completed_item: None,
        }
    }

    #[must_use]
    pub const fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Upsert keyed by the record's own item ntiid.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::PrincipalMismatch`] if the record belongs
    /// to another principal.
    pub fn add_completed_item(
        &mut self,
        completed: CompletedItem,
    ) -> Result<Option<CompletedItem>, CompletionError> {
        let key = completed.item_ntiid().clone();
        self.insert(&key, completed)
    }

    /// Upsert under an explicit item key, returning the replaced record.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::PrincipalMismatch`] if the record belongs
    /// to another principal.
    pub fn insert(
        &mut self,
        key: &impl ItemKey,
        completed: CompletedItem,
    ) -> Result<Option<CompletedItem>, CompletionError> {
        self.check_principal(&completed)?;
        Ok(self.items.insert(key.item_key(), completed))
    }

    #[must_use]
    pub fn get_completed_item(&self, item: &impl ItemKey) -> Option<&CompletedItem> {
        self.items.get(&item.item_key())
    }

    #[must_use]
    pub fn contains(&self, item: &impl ItemKey) -> bool {
        self.items.contains_key(&item.item_key())
    }

    #[must_use]
    pub fn get_completed_item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove the record for `item`. Absent keys are not an error.
    pub fn remove_item(&mut self, item: &impl ItemKey) -> Option<CompletedItem> {
        self.items.remove(&item.item_key())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompletedItem> {
        self.items.values()
    }

    #[must_use]
    pub const fn context_completed_item(&self) -> Option<&CompletedItem> {
        self.context_completed_item.as_ref()
    }

    /// # Errors
    ///
    /// Returns [`CompletionError::PrincipalMismatch`] if the record belongs
    /// to another principal.
    pub fn set_context_completed_item(
        &mut self,
        completed: CompletedItem,
    ) -> Result<(), CompletionError> {
        self.check_principal(&completed)?;
        self.context_completed_item = Some(completed);
        Ok(())
    }

    fn check_principal(&self, completed: &CompletedItem) -> Result<(), CompletionError> {
        if completed.principal().matches(&self.principal) {
            Ok(())
        } else {
            Err(CompletionError::PrincipalMismatch {
                expected: self.principal.clone(),
                actual: completed.principal().clone(),
                item: completed.item_ntiid().clone(),
            })
        }
    }
}

/// All principals' completed items for one completion context.
///
/// Aggregate lookups scan every principal container; callers needing scale
/// should query an external index instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletedItemContainer {
    principals: BTreeMap<String, PrincipalCompletedItemContainer>,
}

impl CompletedItemContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The single container for `principal`, created on first access.
    pub fn get_or_create(&mut self, principal: &PrincipalId) -> &mut PrincipalCompletedItemContainer {
        match self.principals.entry(principal.key()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!(principal = %principal, "creating principal completion container");
                entry.insert(PrincipalCompletedItemContainer::new(principal.clone()))
            }
        }
    }

    #[must_use]
    pub fn get(&self, principal: &PrincipalId) -> Option<&PrincipalCompletedItemContainer> {
        self.principals.get(&principal.key())
    }

    pub fn get_mut(&mut self, principal: &PrincipalId) -> Option<&mut PrincipalCompletedItemContainer> {
        self.principals.get_mut(&principal.key())
    }

    /// Every principal's record for `item`.
    pub fn get_completed_items(&self, item: &impl ItemKey) -> Vec<&CompletedItem> {
        self.principals
            .values()
            .filter_map(|container| container.get_completed_item(item))
            .collect()
    }

    #[must_use]
    pub fn get_completed_item_count(&self, item: &impl ItemKey) -> usize {
        self.principals
            .values()
            .filter(|container| container.contains(item))
            .count()
    }

    /// Remove `item` from every principal, returning how many held it.
    pub fn remove_item(&mut self, item: &impl ItemKey) -> usize {
        self.principals
            .values_mut()
            .filter_map(|container| container.remove_item(item))
            .count()
    }

    pub fn remove_principal(&mut self, principal: &PrincipalId) -> Option<PrincipalCompletedItemContainer> {
        self.principals.remove(&principal.key())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrincipalCompletedItemContainer> {
        self.principals.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletableItem, Ntiid};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn completed(principal: &str, ntiid: &str) -> CompletedItem {
        CompletedItem::detached(
            PrincipalId::new(principal),
            Ntiid::new(ntiid),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn principal_container_is_created_once() {
        let mut container = CompletedItemContainer::new();
        let user = PrincipalId::new("user1");

        container
            .get_or_create(&user)
            .add_completed_item(completed("user1", "tag:a"))
            .unwrap();
        let again = container.get_or_create(&PrincipalId::new("USER1"));
        assert_eq!(again.len(), 1);
        assert_eq!(again.principal().as_str(), "user1");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn add_is_upsert_by_key() {
        let mut container = PrincipalCompletedItemContainer::new(PrincipalId::new("user1"));
        let first = completed("user1", "tag:a");
        assert!(container.add_completed_item(first.clone()).unwrap().is_none());

        let replaced = container.add_completed_item(first.clone()).unwrap();
        assert_eq!(replaced, Some(first));
        assert_eq!(container.get_completed_item_count(), 1);
    }

    #[test]
    fn rejects_other_principals_records() {
        let mut container = PrincipalCompletedItemContainer::new(PrincipalId::new("user2"));
        let err = container
            .add_completed_item(completed("user1", "tag:a"))
            .unwrap_err();
        assert!(matches!(err, CompletionError::PrincipalMismatch { .. }));
        assert!(container.is_empty());

        let err = container
            .set_context_completed_item(completed("user1", "tag:course"))
            .unwrap_err();
        assert!(matches!(err, CompletionError::PrincipalMismatch { .. }));
        assert!(container.context_completed_item().is_none());
    }

    #[test]
    fn remove_of_missing_key_is_noop() {
        let mut container = PrincipalCompletedItemContainer::new(PrincipalId::new("user1"));
        assert!(container.remove_item(&"tag:missing").is_none());
    }

    #[test]
    fn lookups_accept_items_and_raw_ids() {
        let mut container = PrincipalCompletedItemContainer::new(PrincipalId::new("user1"));
        container.add_completed_item(completed("user1", "Tag:A")).unwrap();

        let item = Arc::new(CompletableItem::new("tag:a", "video"));
        assert!(container.get_completed_item(&*item).is_some());
        assert!(container.get_completed_item(&"TAG:A").is_some());
    }

    #[test]
    fn aggregate_counts_and_bulk_removal() {
        let mut container = CompletedItemContainer::new();
        let user1 = PrincipalId::new("user1");
        let user2 = PrincipalId::new("user2");

        assert_eq!(container.get_completed_item_count(&"tag:a"), 0);
        assert_eq!(container.remove_item(&"tag:a"), 0);

        let one = container.get_or_create(&user1);
        one.add_completed_item(completed("user1", "tag:a")).unwrap();
        one.add_completed_item(completed("user1", "tag:b")).unwrap();
        container
            .get_or_create(&user2)
            .add_completed_item(completed("user2", "tag:b"))
            .unwrap();

        assert_eq!(container.get_completed_item_count(&"tag:a"), 1);
        assert_eq!(container.get_completed_item_count(&"tag:b"), 2);
        assert_eq!(container.get_completed_items(&"tag:b").len(), 2);

        assert_eq!(container.remove_item(&"tag:a"), 1);
        assert_eq!(container.get_completed_item_count(&"tag:a"), 0);
        assert_eq!(container.get_completed_item_count(&"tag:b"), 2);

        assert_eq!(container.remove_item(&"tag:b"), 2);
        assert!(container.get(&user1).is_some_and(PrincipalCompletedItemContainer::is_empty));
        assert!(container.get(&user2).is_some_and(PrincipalCompletedItemContainer::is_empty));
    }

    #[test]
    fn remove_principal_drops_sub_container() {
        let mut container = CompletedItemContainer::new();
        let user = PrincipalId::new("user1");
        container
            .get_or_create(&user)
            .add_completed_item(completed("user1", "tag:a"))
            .unwrap();

        let removed = container.remove_principal(&user).expect("principal present");
        assert_eq!(removed.len(), 1);
        assert!(container.is_empty());
        assert_eq!(container.get_completed_item_count(&"tag:a"), 0);
    }
}
