use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use super::ids::{ItemKey, Ntiid, PrincipalId};
use super::item::{CompletableItem, ItemResolver};

/// Administrative grant of completion, recorded on awarded items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub awarder: PrincipalId,
    pub reason: Option<String>,
}

/// Record that a principal finished a completable item.
///
/// Immutable once built: replacing completion state always means removing
/// the old record and inserting a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedItem {
    principal: PrincipalId,
    item_ntiid: Ntiid,
    #[serde(skip)]
    item: Weak<CompletableItem>,
    completed_date: DateTime<Utc>,
    success: bool,
    award: Option<Award>,
}

impl CompletedItem {
    /// Successful completion of `item` by `principal`.
    #[must_use]
    pub fn new(
        principal: PrincipalId,
        item: &Arc<CompletableItem>,
        completed_date: DateTime<Utc>,
    ) -> Self {
        Self {
            principal,
            item_ntiid: item.ntiid.clone(),
            item: Arc::downgrade(item),
            completed_date,
            success: true,
            award: None,
        }
    }

    /// Record that only knows the item's ntiid (the item may not be live).
    #[must_use]
    pub fn detached(
        principal: PrincipalId,
        item_ntiid: Ntiid,
        completed_date: DateTime<Utc>,
    ) -> Self {
        Self {
            principal,
            item_ntiid,
            item: Weak::new(),
            completed_date,
            success: true,
            award: None,
        }
    }

    #[must_use]
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    #[must_use]
    pub fn with_item_handle(mut self, item: Option<&Arc<CompletableItem>>) -> Self {
        self.item = item.map_or_else(Weak::new, Arc::downgrade);
        self
    }

    #[must_use]
    pub fn with_award(mut self, award: Award) -> Self {
        self.award = Some(award);
        self
    }

    #[must_use]
    pub const fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    /// Cached ntiid; survives deletion of the underlying item.
    #[must_use]
    pub const fn item_ntiid(&self) -> &Ntiid {
        &self.item_ntiid
    }

    /// The live item, if it is still around.
    #[must_use]
    pub fn item(&self) -> Option<Arc<CompletableItem>> {
        self.item.upgrade()
    }

    /// The live item, falling back to a registry lookup by ntiid.
    pub fn resolve_item(&self, resolver: &dyn ItemResolver) -> Option<Arc<CompletableItem>> {
        self.item()
            .or_else(|| resolver.resolve(self.item_ntiid.as_str()))
    }

    #[must_use]
    pub const fn completed_date(&self) -> DateTime<Utc> {
        self.completed_date
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub const fn award(&self) -> Option<&Award> {
        self.award.as_ref()
    }

    #[must_use]
    pub const fn is_awarded(&self) -> bool {
        self.award.is_some()
    }
}

impl PartialEq for CompletedItem {
    fn eq(&self, other: &Self) -> bool {
        self.principal == other.principal
            && self.item_ntiid == other.item_ntiid
            && self.completed_date == other.completed_date
            && self.success == other.success
            && self.award == other.award
    }
}

impl ItemKey for CompletedItem {
    fn item_ntiid(&self) -> &str {
        self.item_ntiid.as_str()
    }
}
