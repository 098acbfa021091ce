//! Per-context state and the store that owns it.
//!
//! Each completion context owns exactly one [`ContextContainers`]: its
//! required/optional designations, completed records, policies, and
//! default-required mime types. The store is the only place contexts are
//! looked up; durable stores implement [`ContextStore`] over their own
//! persistence.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::config::CompletionConfig;
use crate::container::{CompletableItemContainer, CompletedItemContainer};
use crate::model::{CompletableItem, CompletionContext};
use crate::policy::{DefaultRequiredPolicy, PolicyContainer};

#[derive(Debug, Clone, Default)]
pub struct ContextContainers {
    completable: CompletableItemContainer,
    completed: CompletedItemContainer,
    policies: PolicyContainer,
    default_required: DefaultRequiredPolicy,
}

impl ContextContainers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn completable(&self) -> &CompletableItemContainer {
        &self.completable
    }

    pub const fn completable_mut(&mut self) -> &mut CompletableItemContainer {
        &mut self.completable
    }

    #[must_use]
    pub const fn completed(&self) -> &CompletedItemContainer {
        &self.completed
    }

    pub const fn completed_mut(&mut self) -> &mut CompletedItemContainer {
        &mut self.completed
    }

    #[must_use]
    pub const fn policies(&self) -> &PolicyContainer {
        &self.policies
    }

    pub const fn policies_mut(&mut self) -> &mut PolicyContainer {
        &mut self.policies
    }

    #[must_use]
    pub const fn default_required(&self) -> &DefaultRequiredPolicy {
        &self.default_required
    }

    pub const fn default_required_mut(&mut self) -> &mut DefaultRequiredPolicy {
        &mut self.default_required
    }

    /// Explicit required, then explicit optional, then the default mime
    /// types. A missing item is never required.
    #[must_use]
    pub fn is_item_required(&self, item: Option<&CompletableItem>) -> bool {
        let Some(item) = item else {
            return false;
        };
        if self.completable.is_item_required(item) {
            return true;
        }
        if self.completable.is_item_optional(item) {
            return false;
        }
        self.default_required.contains(&item.mime_type)
    }

    /// Mirror of [`Self::is_item_required`] for items that exist.
    #[must_use]
    pub fn is_item_optional(&self, item: Option<&CompletableItem>) -> bool {
        item.is_some() && !self.is_item_required(item)
    }
}

pub trait ContextStore {
    fn state(&self, context: &CompletionContext) -> Option<&ContextContainers>;

    fn state_mut(&mut self, context: &CompletionContext) -> Option<&mut ContextContainers>;
}

/// Contexts held in memory, keyed by context ntiid (case-insensitive).
///
/// Contexts must be registered before reconciliation can touch them; an
/// unregistered context is the "no container" case the engine tolerates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextStore {
    contexts: BTreeMap<String, (CompletionContext, ContextContainers)>,
    default_mime_types: Vec<String>,
}

impl InMemoryContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose new contexts start with the configured default-required
    /// mime types.
    #[must_use]
    pub fn with_config(config: &CompletionConfig) -> Self {
        Self {
            contexts: BTreeMap::new(),
            default_mime_types: config.required.default_mime_types.clone(),
        }
    }

    /// The context's state, created on first access.
    pub fn register(&mut self, context: &CompletionContext) -> &mut ContextContainers {
        match self.contexts.entry(context.ntiid.key()) {
            Entry::Occupied(entry) => &mut entry.into_mut().1,
            Entry::Vacant(entry) => {
                tracing::debug!(context = %context.ntiid, "creating completion context containers");
                let mut state = ContextContainers::new();
                state
                    .default_required_mut()
                    .add_mime_types(self.default_mime_types.iter().cloned());
                &mut entry.insert((context.clone(), state)).1
            }
        }
    }

    /// Drop a deleted context together with all of its containers.
    pub fn remove(&mut self, context: &CompletionContext) -> Option<ContextContainers> {
        self.contexts
            .remove(&context.ntiid.key())
            .map(|(_, state)| state)
    }

    #[must_use]
    pub fn contains(&self, context: &CompletionContext) -> bool {
        self.contexts.contains_key(&context.ntiid.key())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn contexts(&self) -> impl Iterator<Item = &CompletionContext> {
        self.contexts.values().map(|(context, _)| context)
    }
}

impl ContextStore for InMemoryContextStore {
    fn state(&self, context: &CompletionContext) -> Option<&ContextContainers> {
        self.contexts
            .get(&context.ntiid.key())
            .map(|(_, state)| state)
    }

    fn state_mut(&mut self, context: &CompletionContext) -> Option<&mut ContextContainers> {
        self.contexts
            .get_mut(&context.ntiid.key())
            .map(|(_, state)| state)
    }
}
