//! Capabilities the host platform plugs into the engine.
//!
//! - [`ProgressProvider`]: current progress for (principal, item, context).
//! - [`CompletableItemProvider`]: items a principal could complete in a
//!   context, registered as "possible" or "required" on an
//!   [`ItemProviderRegistry`].
//! - [`CompletionContextProvider`]: the context an item belongs to.
//! - [`CompletedItemProvider`]: a principal's completion records in a
//!   context.
//!
//! Plain closures implement all of them, so hosts can register lookups
//! without defining a type.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::{
    CompletableItem, CompletedItem, CompletionContext, ItemCatalog, ItemKey, PrincipalId, Progress,
};
use crate::store::{ContextContainers, ContextStore, InMemoryContextStore};

pub trait ProgressProvider: Send + Sync {
    /// `None` means no progress data is available, which is not an error.
    fn progress(
        &self,
        principal: &PrincipalId,
        item: &CompletableItem,
        context: &CompletionContext,
    ) -> Option<Progress>;
}

impl<F> ProgressProvider for F
where
    F: Fn(&PrincipalId, &CompletableItem, &CompletionContext) -> Option<Progress> + Send + Sync,
{
    fn progress(
        &self,
        principal: &PrincipalId,
        item: &CompletableItem,
        context: &CompletionContext,
    ) -> Option<Progress> {
        self(principal, item, context)
    }
}

/// Progress providers keyed by item mime type, with an optional catch-all.
#[derive(Default)]
pub struct ProgressRegistry {
    by_mime_type: HashMap<String, Box<dyn ProgressProvider>>,
    fallback: Option<Box<dyn ProgressProvider>>,
}

impl ProgressRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_mime_type(
        &mut self,
        mime_type: impl Into<String>,
        provider: impl ProgressProvider + 'static,
    ) {
        self.by_mime_type.insert(mime_type.into(), Box::new(provider));
    }

    pub fn set_fallback(&mut self, provider: impl ProgressProvider + 'static) {
        self.fallback = Some(Box::new(provider));
    }
}

impl std::fmt::Debug for ProgressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressRegistry")
            .field("mime_types", &self.by_mime_type.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl ProgressProvider for ProgressRegistry {
    fn progress(
        &self,
        principal: &PrincipalId,
        item: &CompletableItem,
        context: &CompletionContext,
    ) -> Option<Progress> {
        self.by_mime_type
            .get(&item.mime_type)
            .or(self.fallback.as_ref())
            .and_then(|provider| provider.progress(principal, item, context))
    }
}

/// Progress snapshots pushed in by the host, keyed by (principal, item).
///
/// Interior mutability lets the host update progress while the engine holds
/// a shared reference.
#[derive(Debug, Default)]
pub struct InMemoryProgress {
    entries: RwLock<HashMap<(String, String), Progress>>,
}

impl InMemoryProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress; the principal and item come from the snapshot.
    pub fn set(&self, progress: Progress) {
        let key = (progress.user.key(), progress.ntiid.key());
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, progress);
    }

    pub fn remove(&self, principal: &PrincipalId, item: &impl ItemKey) -> Option<Progress> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(principal.key(), item.item_key()))
    }
}

impl ProgressProvider for InMemoryProgress {
    fn progress(
        &self,
        principal: &PrincipalId,
        item: &CompletableItem,
        _context: &CompletionContext,
    ) -> Option<Progress> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(principal.key(), item.item_key()))
            .cloned()
    }
}

pub trait CompletableItemProvider: Send + Sync {
    fn iter_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<Arc<CompletableItem>>;
}

impl<F> CompletableItemProvider for F
where
    F: Fn(&PrincipalId, &CompletionContext) -> Vec<Arc<CompletableItem>> + Send + Sync,
{
    fn iter_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<Arc<CompletableItem>> {
        self(principal, context)
    }
}

/// Every live item in the catalog is possible in every context.
impl CompletableItemProvider for ItemCatalog {
    fn iter_items(
        &self,
        _principal: &PrincipalId,
        _context: &CompletionContext,
    ) -> Vec<Arc<CompletableItem>> {
        self.live_items()
    }
}

pub trait CompletionContextProvider: Send + Sync {
    /// `None` when the item sits outside any completion context.
    fn context_for(&self, item: &CompletableItem) -> Option<CompletionContext>;
}

impl<F> CompletionContextProvider for F
where
    F: Fn(&CompletableItem) -> Option<CompletionContext> + Send + Sync,
{
    fn context_for(&self, item: &CompletableItem) -> Option<CompletionContext> {
        self(item)
    }
}

pub trait CompletedItemProvider: Send + Sync {
    fn completed_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<CompletedItem>;
}

impl<F> CompletedItemProvider for F
where
    F: Fn(&PrincipalId, &CompletionContext) -> Vec<CompletedItem> + Send + Sync,
{
    fn completed_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<CompletedItem> {
        self(principal, context)
    }
}

/// Records held for the principal in the context's container. Unknown
/// contexts and principals yield nothing.
impl CompletedItemProvider for InMemoryContextStore {
    fn completed_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<CompletedItem> {
        self.state(context)
            .and_then(|state| state.completed().get(principal))
            .map(|container| container.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Subscriber lists of item providers. Results are unioned across providers
/// and deduplicated by ntiid, keeping the first item seen.
#[derive(Default, Clone)]
pub struct ItemProviderRegistry {
    possible: Vec<Arc<dyn CompletableItemProvider>>,
    required: Vec<Arc<dyn CompletableItemProvider>>,
}

impl ItemProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_possible(&mut self, provider: Arc<dyn CompletableItemProvider>) {
        self.possible.push(provider);
    }

    pub fn register_required(&mut self, provider: Arc<dyn CompletableItemProvider>) {
        self.required.push(provider);
    }

    #[must_use]
    pub fn possible_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<Arc<CompletableItem>> {
        union_items(&self.possible, principal, context)
    }

    #[must_use]
    pub fn required_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<Arc<CompletableItem>> {
        union_items(&self.required, principal, context)
    }
}

impl std::fmt::Debug for ItemProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemProviderRegistry")
            .field("possible", &self.possible.len())
            .field("required", &self.required.len())
            .finish()
    }
}

fn union_items(
    providers: &[Arc<dyn CompletableItemProvider>],
    principal: &PrincipalId,
    context: &CompletionContext,
) -> Vec<Arc<CompletableItem>> {
    let mut seen = HashSet::new();
    providers
        .iter()
        .flat_map(|provider| provider.iter_items(principal, context))
        .filter(|item| seen.insert(item.ntiid.key()))
        .collect()
}

/// Required items derived from the possible ones: whatever the context
/// classifies as required.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRequiredItemProvider<'a> {
    possible: &'a ItemProviderRegistry,
    state: &'a ContextContainers,
}

impl<'a> DefaultRequiredItemProvider<'a> {
    #[must_use]
    pub const fn new(possible: &'a ItemProviderRegistry, state: &'a ContextContainers) -> Self {
        Self { possible, state }
    }
}

impl CompletableItemProvider for DefaultRequiredItemProvider<'_> {
    fn iter_items(
        &self,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Vec<Arc<CompletableItem>> {
        self.possible
            .possible_items(principal, context)
            .into_iter()
            .filter(|item| self.state.is_item_required(Some(item.as_ref())))
            .collect()
    }
}
