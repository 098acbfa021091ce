use std::collections::HashMap;
use std::sync::Arc;

use super::{AggregateCompletionPolicy, CompletionPolicy};
use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::model::{CompletableItem, CompletionContext};

/// Resolves the policy governing an item within a context.
pub trait PolicyProvider {
    fn policy_for(
        &self,
        item: &CompletableItem,
        context: &CompletionContext,
    ) -> Option<Arc<dyn CompletionPolicy>>;
}

/// Registration-time policy lookup.
///
/// Precedence: (item mime type, context) pair, then mime type alone, then
/// the registry default. Per-item overrides live on the context's
/// [`super::PolicyContainer`] and are consulted before this registry.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    by_context: HashMap<(String, String), Arc<dyn CompletionPolicy>>,
    by_mime_type: HashMap<String, Arc<dyn CompletionPolicy>>,
    default: Option<Arc<dyn CompletionPolicy>>,
}

impl PolicyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose default is the configured aggregate policy.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::InvalidPolicy`] for out-of-range thresholds.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let mut registry = Self::new();
        registry.set_default(Arc::new(config.policy.to_policy()?));
        Ok(registry)
    }

    pub fn set_default(&mut self, policy: Arc<dyn CompletionPolicy>) {
        self.default = Some(policy);
    }

    pub fn register_mime_type(
        &mut self,
        mime_type: impl Into<String>,
        policy: Arc<dyn CompletionPolicy>,
    ) {
        self.by_mime_type.insert(mime_type.into(), policy);
    }

    pub fn register_for_context(
        &mut self,
        mime_type: impl Into<String>,
        context: &CompletionContext,
        policy: Arc<dyn CompletionPolicy>,
    ) {
        self.by_context
            .insert((mime_type.into(), context.ntiid.key()), policy);
    }
}

impl PolicyProvider for PolicyRegistry {
    fn policy_for(
        &self,
        item: &CompletableItem,
        context: &CompletionContext,
    ) -> Option<Arc<dyn CompletionPolicy>> {
        self.by_context
            .get(&(item.mime_type.clone(), context.ntiid.key()))
            .or_else(|| self.by_mime_type.get(&item.mime_type))
            .or(self.default.as_ref())
            .cloned()
    }
}

/// Every item gets the same aggregate policy.
impl PolicyProvider for AggregateCompletionPolicy {
    fn policy_for(
        &self,
        _item: &CompletableItem,
        _context: &CompletionContext,
    ) -> Option<Arc<dyn CompletionPolicy>> {
        Some(Arc::new(self.clone()))
    }
}
