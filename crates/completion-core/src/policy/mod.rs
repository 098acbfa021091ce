//! Completion policies: the pluggable rule deciding whether progress counts
//! as completion.
//!
//! A policy is evaluated once per reconciliation and keeps no state between
//! calls. [`AggregateCompletionPolicy`] is the stock threshold policy; hosts
//! plug in their own through [`CompletionPolicy`] and register them on a
//! [`PolicyRegistry`].

pub mod container;
pub mod registry;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

use crate::error::CompletionError;
use crate::model::{CompletedItem, Progress};

pub use container::PolicyContainer;
pub use registry::{PolicyProvider, PolicyRegistry};

/// Strategy deciding whether a progress snapshot is a completion.
pub trait CompletionPolicy: fmt::Debug + Send + Sync {
    /// `None` when progress is unavailable or insufficient; otherwise a fresh
    /// completed record for the progress' user and item.
    fn is_complete(&self, progress: Option<&Progress>) -> Option<CompletedItem>;

    fn offers_completion_certificate(&self) -> bool {
        false
    }

    fn certificate_renderer_name(&self) -> Option<&str> {
        None
    }
}

/// Threshold policy over absolute count and/or completion ratio.
///
/// With both thresholds unset any available progress completes the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCompletionPolicy {
    percentage: Option<f64>,
    count: Option<f64>,
    #[serde(default)]
    pub offers_completion_certificate: bool,
    #[serde(default)]
    pub certificate_renderer_name: Option<String>,
}

impl Default for AggregateCompletionPolicy {
    fn default() -> Self {
        Self {
            percentage: Some(1.0),
            count: None,
            offers_completion_certificate: false,
            certificate_renderer_name: None,
        }
    }
}

impl AggregateCompletionPolicy {
    /// # Errors
    ///
    /// Returns [`CompletionError::InvalidPolicy`] when `percentage` is outside
    /// `[0, 1]`.
    pub fn with_percentage(percentage: f64) -> Result<Self, CompletionError> {
        let mut policy = Self::default();
        policy.set_percentage(Some(percentage))?;
        Ok(policy)
    }

    /// Policy with neither threshold set.
    #[must_use]
    pub fn unconstrained() -> Self {
        Self {
            percentage: None,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn percentage(&self) -> Option<f64> {
        self.percentage
    }

    #[must_use]
    pub const fn count(&self) -> Option<f64> {
        self.count
    }

    /// # Errors
    ///
    /// Returns [`CompletionError::InvalidPolicy`] when `percentage` is outside
    /// `[0, 1]`.
    pub fn set_percentage(&mut self, percentage: Option<f64>) -> Result<(), CompletionError> {
        if let Some(value) = percentage {
            if !(0.0..=1.0).contains(&value) {
                return Err(CompletionError::InvalidPolicy {
                    field: "percentage",
                    value,
                });
            }
        }
        self.percentage = percentage;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`CompletionError::InvalidPolicy`] for a negative count.
    pub fn set_count(&mut self, count: Option<f64>) -> Result<(), CompletionError> {
        if let Some(value) = count {
            if value.is_nan() || value < 0.0 {
                return Err(CompletionError::InvalidPolicy {
                    field: "count",
                    value,
                });
            }
        }
        self.count = count;
        Ok(())
    }

    fn meets_thresholds(&self, progress: &Progress) -> bool {
        let absolute = progress.absolute_progress.unwrap_or(0.0);

        if let Some(count) = self.count.filter(|count| *count > 0.0) {
            if absolute < count {
                return false;
            }
        }

        if let Some(percentage) = self.percentage.filter(|percentage| *percentage > 0.0) {
            let Some(max) = progress.max_possible_progress.filter(|max| *max != 0.0) else {
                warn!(
                    ntiid = %progress.ntiid,
                    absolute = ?progress.absolute_progress,
                    max = ?progress.max_possible_progress,
                    "No MaxPossibleProgress given when computing completion"
                );
                return false;
            };
            return absolute / max >= percentage;
        }

        true
    }
}

impl CompletionPolicy for AggregateCompletionPolicy {
    fn is_complete(&self, progress: Option<&Progress>) -> Option<CompletedItem> {
        let progress = progress?;
        if !self.meets_thresholds(progress) {
            return None;
        }

        let completed_date = progress.last_modified.unwrap_or_else(Utc::now);
        let completed = CompletedItem::detached(
            progress.user.clone(),
            progress.ntiid.clone(),
            completed_date,
        )
        .with_item_handle(progress.item.as_ref())
        .with_success(progress.all_successful());
        Some(completed)
    }

    fn offers_completion_certificate(&self) -> bool {
        self.offers_completion_certificate
    }

    fn certificate_renderer_name(&self) -> Option<&str> {
        self.certificate_renderer_name.as_deref()
    }
}

/// Mime types whose items are required by default in a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRequiredPolicy {
    mime_types: BTreeSet<String>,
}

impl DefaultRequiredPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mime_types<I, S>(&mut self, mime_types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types.extend(mime_types.into_iter().map(Into::into));
    }

    /// Replace the whole set.
    pub fn set_mime_types<I, S>(&mut self, mime_types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mime_types = mime_types.into_iter().map(Into::into).collect();
    }

    #[must_use]
    pub fn contains(&self, mime_type: &str) -> bool {
        self.mime_types.contains(mime_type)
    }

    #[must_use]
    pub const fn mime_types(&self) -> &BTreeSet<String> {
        &self.mime_types
    }
}
