//! Read-only filtering over a context's completed records.
//!
//! Every call is a linear scan of the [`CompletedItemContainer`]; no index is
//! maintained. Hosts with many principals should query their own catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::CompletedItemContainer;
use crate::model::{CompletedItem, ItemKey, Ntiid, PrincipalId};

/// Filter criteria for completed records.
///
/// All fields are optional. When multiple fields are set, they are combined
/// with AND semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedItemQuery {
    /// Owning principal (case-insensitive).
    pub principal: Option<PrincipalId>,
    /// Completed item ntiid (case-insensitive).
    pub item: Option<Ntiid>,
    pub success: Option<bool>,
    /// Inclusive lower bound on the completion date.
    pub completed_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the completion date.
    pub completed_before: Option<DateTime<Utc>>,
    /// Only records created by an award.
    #[serde(default)]
    pub awarded_only: bool,
    pub limit: Option<usize>,
}

impl CompletedItemQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn principal(mut self, principal: impl Into<PrincipalId>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    #[must_use]
    pub fn item(mut self, item: &impl ItemKey) -> Self {
        self.item = Some(Ntiid::new(item.item_ntiid()));
        self
    }

    #[must_use]
    pub const fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    #[must_use]
    pub const fn completed_between(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.completed_after = after;
        self.completed_before = before;
        self
    }

    #[must_use]
    pub const fn awarded_only(mut self) -> Self {
        self.awarded_only = true;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn matches(&self, completed: &CompletedItem) -> bool {
        if let Some(principal) = &self.principal {
            if !completed.principal().matches(principal) {
                return false;
            }
        }
        if let Some(item) = &self.item {
            if completed.item_key() != item.key() {
                return false;
            }
        }
        if self.success.is_some_and(|success| completed.success() != success) {
            return false;
        }
        if self
            .completed_after
            .is_some_and(|after| completed.completed_date() < after)
        {
            return false;
        }
        if self
            .completed_before
            .is_some_and(|before| completed.completed_date() >= before)
        {
            return false;
        }
        !self.awarded_only || completed.is_awarded()
    }

    /// Matching records in principal order, then item order.
    #[must_use]
    pub fn run<'a>(&self, container: &'a CompletedItemContainer) -> Vec<&'a CompletedItem> {
        let matches = container
            .iter()
            .filter(|principal| {
                self.principal
                    .as_ref()
                    .is_none_or(|wanted| principal.principal().matches(wanted))
            })
            .flat_map(|principal| principal.iter())
            .filter(|completed| self.matches(completed));
        match self.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        }
    }

    #[must_use]
    pub fn count(&self, container: &CompletedItemContainer) -> usize {
        self.run(container).len()
    }
}
