use std::collections::BTreeMap;
use std::sync::Arc;

use super::CompletionPolicy;
use crate::model::{ItemKey, Ntiid};

/// Policies attached to one completion context.
///
/// Holds the context's own policy (deciding context completion) and
/// per-item overrides that win over anything registered globally.
#[derive(Debug, Clone, Default)]
pub struct PolicyContainer {
    context_policy: Option<Arc<dyn CompletionPolicy>>,
    items: BTreeMap<String, (Ntiid, Arc<dyn CompletionPolicy>)>,
}

impl PolicyContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn context_policy(&self) -> Option<&Arc<dyn CompletionPolicy>> {
        self.context_policy.as_ref()
    }

    /// Replace the context policy, returning the previous one.
    pub fn set_context_policy(
        &mut self,
        policy: Arc<dyn CompletionPolicy>,
    ) -> Option<Arc<dyn CompletionPolicy>> {
        self.context_policy.replace(policy)
    }

    pub fn clear_context_policy(&mut self) -> Option<Arc<dyn CompletionPolicy>> {
        self.context_policy.take()
    }

    /// Override the policy for a single item.
    pub fn insert(
        &mut self,
        item: &impl ItemKey,
        policy: Arc<dyn CompletionPolicy>,
    ) -> Option<Arc<dyn CompletionPolicy>> {
        self.items
            .insert(item.item_key(), (Ntiid::new(item.item_ntiid()), policy))
            .map(|(_, previous)| previous)
    }

    #[must_use]
    pub fn get(&self, item: &impl ItemKey) -> Option<&Arc<dyn CompletionPolicy>> {
        self.items.get(&item.item_key()).map(|(_, policy)| policy)
    }

    pub fn remove(&mut self, item: &impl ItemKey) -> Option<Arc<dyn CompletionPolicy>> {
        self.items.remove(&item.item_key()).map(|(_, policy)| policy)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ntiid, &Arc<dyn CompletionPolicy>)> {
        self.items.values().map(|(ntiid, policy)| (ntiid, policy))
    }
}
