//! Context-level progress, computed on demand from per-item records.
//!
//! Nothing here is persisted except the principal's first successful
//! context completion, which is kept only so `ContextCompleted` fires once.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::engine::Reconciler;
use crate::error::CompletionError;
use crate::event::CompletionEvent;
use crate::model::{
    CompletableItem, CompletionContext, CompletionContextProgress, PrincipalId, Progress,
};
use crate::policy::CompletionPolicy;
use crate::store::{ContextContainers, ContextStore};

/// Aggregate `principal`'s records over the context's `required` items.
///
/// AbsoluteProgress counts required items with any record (successful or
/// not); MaxPossibleProgress is the number of distinct required items. A
/// context with no required items is never complete.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn context_progress(
    state: &ContextContainers,
    required: &[Arc<CompletableItem>],
    principal: &PrincipalId,
    context: &CompletionContext,
    policy: Option<&dyn CompletionPolicy>,
) -> CompletionContextProgress {
    let records = state.completed().get(principal);

    let mut seen = HashSet::new();
    let mut completed = 0_usize;
    let mut last_modified = None;
    let mut unsuccessful = BTreeSet::new();
    let mut incomplete = BTreeSet::new();

    for item in required {
        if !seen.insert(item.ntiid.key()) {
            continue;
        }
        match records.and_then(|records| records.get_completed_item(&item.ntiid)) {
            Some(record) => {
                completed += 1;
                if !record.success() {
                    unsuccessful.insert(item.ntiid.clone());
                }
                last_modified = last_modified.max(Some(record.completed_date()));
            }
            None => {
                incomplete.insert(item.ntiid.clone());
            }
        }
    }

    let max = seen.len();
    let mut progress = Progress::new(context.ntiid.clone(), principal.clone())
        .with_amounts(completed as f64, Some(max as f64))
        .with_context(context.ntiid.clone())
        .with_unsuccessful(unsuccessful);
    progress.last_modified = last_modified;

    let completed_item = if max == 0 {
        None
    } else {
        policy.and_then(|policy| policy.is_complete(Some(&progress)))
    };

    CompletionContextProgress {
        progress,
        completed_item,
        incomplete_item_ntiids: incomplete,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextCompletion {
    pub progress: CompletionContextProgress,
    /// True only on the call that first recorded a successful completion.
    pub newly_completed: bool,
}

impl Reconciler<'_> {
    /// # Errors
    ///
    /// Returns [`CompletionError::ContextNotFound`] for an unregistered
    /// context.
    pub fn context_progress<S: ContextStore + ?Sized>(
        &self,
        store: &S,
        required: &[Arc<CompletableItem>],
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Result<CompletionContextProgress, CompletionError> {
        let state = store
            .state(context)
            .ok_or_else(|| CompletionError::ContextNotFound(context.ntiid.clone()))?;
        let policy = self.context_policy(state, context);
        Ok(context_progress(
            state,
            required,
            principal,
            context,
            policy.as_deref(),
        ))
    }

    /// Recompute context progress and broadcast the principal's first
    /// successful completion of the context.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::ContextNotFound`] for an unregistered
    /// context.
    pub fn update_context_completion<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        required: &[Arc<CompletableItem>],
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Result<ContextCompletion, CompletionError> {
        let state = store
            .state_mut(context)
            .ok_or_else(|| CompletionError::ContextNotFound(context.ntiid.clone()))?;
        let policy = self.context_policy(state, context);
        let progress = context_progress(state, required, principal, context, policy.as_deref());

        let mut newly_completed = false;
        if let Some(completed) = progress.completed_item.as_ref().filter(|c| c.success()) {
            let container = state.completed_mut().get_or_create(principal);
            if container.context_completed_item().is_none() {
                container.set_context_completed_item(completed.clone())?;
                info!(principal = %principal, context = %context.ntiid, "Context completed");
                self.events.notify(CompletionEvent::ContextCompleted {
                    context: context.ntiid.clone(),
                    completed: completed.clone(),
                });
                newly_completed = true;
            }
        }

        Ok(ContextCompletion {
            progress,
            newly_completed,
        })
    }
}
