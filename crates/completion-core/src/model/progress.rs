use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::completed::CompletedItem;
use super::ids::{Ntiid, PrincipalId};
use super::item::CompletableItem;

/// Transient snapshot of how far a principal has gotten on an item.
///
/// Supplied by a progress provider and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub ntiid: Ntiid,
    pub user: PrincipalId,
    pub absolute_progress: Option<f64>,
    pub max_possible_progress: Option<f64>,
    pub has_progress: bool,
    #[serde(skip)]
    pub item: Option<Arc<CompletableItem>>,
    pub completion_context: Option<Ntiid>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Sub-items completed without success; any entry makes a resulting
    /// completion unsuccessful.
    #[serde(default)]
    pub unsuccessful_item_ntiids: BTreeSet<Ntiid>,
}

impl Progress {
    #[must_use]
    pub fn new(ntiid: impl Into<Ntiid>, user: PrincipalId) -> Self {
        Self {
            ntiid: ntiid.into(),
            user,
            absolute_progress: None,
            max_possible_progress: None,
            has_progress: false,
            item: None,
            completion_context: None,
            last_modified: None,
            unsuccessful_item_ntiids: BTreeSet::new(),
        }
    }

    /// Progress on a live item; the ntiid is taken from the item.
    #[must_use]
    pub fn for_item(item: &Arc<CompletableItem>, user: PrincipalId) -> Self {
        let mut progress = Self::new(item.ntiid.clone(), user);
        progress.item = Some(Arc::clone(item));
        progress
    }

    /// Set absolute and max progress. `has_progress` follows a positive
    /// absolute value.
    #[must_use]
    pub fn with_amounts(mut self, absolute: f64, max_possible: Option<f64>) -> Self {
        self.absolute_progress = Some(absolute);
        self.max_possible_progress = max_possible;
        self.has_progress = absolute > 0.0;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<Ntiid>) -> Self {
        self.completion_context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    #[must_use]
    pub fn with_unsuccessful(mut self, ntiids: impl IntoIterator<Item = Ntiid>) -> Self {
        self.unsuccessful_item_ntiids.extend(ntiids);
        self
    }

    /// `absolute / max`, or `None` when the denominator is missing or zero.
    #[must_use]
    pub fn percentage_progress(&self) -> Option<f64> {
        let max = self.max_possible_progress.filter(|max| *max != 0.0)?;
        Some(self.absolute_progress.unwrap_or(0.0) / max)
    }

    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.unsuccessful_item_ntiids.is_empty()
    }
}

/// Progress on a completion context, with the aggregate view of its
/// required items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionContextProgress {
    #[serde(flatten)]
    pub progress: Progress,
    pub completed_item: Option<CompletedItem>,
    pub incomplete_item_ntiids: BTreeSet<Ntiid>,
}

impl CompletionContextProgress {
    #[must_use]
    pub const fn completed(&self) -> bool {
        self.completed_item.is_some()
    }

    #[must_use]
    pub fn completed_date(&self) -> Option<DateTime<Utc>> {
        self.completed_item.as_ref().map(CompletedItem::completed_date)
    }

    #[must_use]
    pub const fn unsuccessful_item_ntiids(&self) -> &BTreeSet<Ntiid> {
        &self.progress.unsuccessful_item_ntiids
    }
}
