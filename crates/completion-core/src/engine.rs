//! Completion-state reconciliation.
//!
//! Given a principal's recorded completion of an item, fresh progress, and
//! the governing policy, decide whether to add, replace, or drop the record
//! and whether the context's listeners need to hear about it.
//!
//! Replacement is always remove-then-insert: the old record leaves the
//! container (`CompletedItemRemoved`) before the new one enters
//! (`CompletedItemAdded`). A context-scoped `UserProgressUpdated` follows
//! only when the item is required and the (complete, success) pair actually
//! changed.
//!
//! The engine holds no locks. It assumes one writer per (principal, context)
//! at a time; conflicting writers are the store's problem.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::error::CompletionError;
use crate::event::{CompletionEvent, EventSink};
use crate::model::{
    Award, CompletableItem, CompletedItem, CompletionContext, ItemKey, Ntiid, PrincipalId,
};
use crate::policy::{CompletionPolicy, PolicyProvider};
use crate::provider::ProgressProvider;
use crate::store::{ContextContainers, ContextStore};

/// Before/after view of one principal's completion of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub was_complete: bool,
    pub prev_success: bool,
    pub is_complete: bool,
    pub success: bool,
    /// Whether `UserProgressUpdated` was fired.
    pub notified: bool,
}

impl Transition {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.was_complete != self.is_complete || self.prev_success != self.success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The context has no containers; nothing was touched.
    MissingContainer,
    /// Already successfully complete and no overwrite was requested.
    Unchanged,
    Reconciled(Transition),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    MissingContainer,
    NotPresent,
    Removed {
        completed: CompletedItem,
        notified: bool,
    },
}

/// Result of reacting to withdrawn progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRemovedOutcome {
    pub removed: RemoveOutcome,
    /// `None` when the record was dropped but the item is gone, so nothing
    /// could be recomputed.
    pub reconciled: Option<ReconcileOutcome>,
}

/// The reconciliation engine, wired to its collaborators.
#[derive(Clone, Copy)]
pub struct Reconciler<'a> {
    pub(crate) policies: &'a dyn PolicyProvider,
    pub(crate) progress: &'a dyn ProgressProvider,
    pub(crate) events: &'a dyn EventSink,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub const fn new(
        policies: &'a dyn PolicyProvider,
        progress: &'a dyn ProgressProvider,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            policies,
            progress,
            events,
        }
    }

    /// Bring the principal's record for `item_ntiid` in line with current
    /// progress.
    ///
    /// An already successful record is left alone unless `overwrite` is set.
    /// A missing context is logged and reported as
    /// [`ReconcileOutcome::MissingContainer`], not as an error.
    ///
    /// # Errors
    ///
    /// - [`CompletionError::PolicyNotFound`] when reconciliation is needed but
    ///   no live item is given or no policy is registered for it.
    /// - [`CompletionError::PrincipalMismatch`] when the policy produced a
    ///   record for another principal.
    pub fn update_completion<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        item: Option<&CompletableItem>,
        item_ntiid: &Ntiid,
        principal: &PrincipalId,
        context: &CompletionContext,
        overwrite: bool,
    ) -> Result<ReconcileOutcome, CompletionError> {
        let (outcome, required) =
            self.reconcile_item(store, item, item_ntiid, principal, context, overwrite)?;
        let ReconcileOutcome::Reconciled(mut transition) = outcome else {
            return Ok(outcome);
        };
        if required && transition.changed() {
            self.notify_progress(principal, context);
            transition.notified = true;
        }
        Ok(ReconcileOutcome::Reconciled(transition))
    }

    /// Reconcile without announcing the transition. Returns the outcome
    /// and whether the item is required in the context.
    fn reconcile_item<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        item: Option<&CompletableItem>,
        item_ntiid: &Ntiid,
        principal: &PrincipalId,
        context: &CompletionContext,
        overwrite: bool,
    ) -> Result<(ReconcileOutcome, bool), CompletionError> {
        let Some(state) = store.state_mut(context) else {
            warn!(
                context = %context.ntiid,
                principal = %principal,
                item = %item_ntiid,
                "No container found for completion context"
            );
            return Ok((ReconcileOutcome::MissingContainer, false));
        };

        let existing_success = state
            .completed()
            .get(principal)
            .and_then(|container| container.get_completed_item(item_ntiid))
            .map(CompletedItem::success);
        if existing_success == Some(true) && !overwrite {
            trace!(principal = %principal, item = %item_ntiid, "already complete, skipping");
            return Ok((ReconcileOutcome::Unchanged, false));
        }

        let Some(item) = item else {
            return Err(policy_not_found(item_ntiid, context));
        };
        let policy = self
            .item_policy(state, item_ntiid, item, context)
            .ok_or_else(|| policy_not_found(item_ntiid, context))?;

        let progress = self.progress.progress(principal, item, context);
        let candidate = match progress.as_ref() {
            Some(progress) => policy.is_complete(Some(progress)),
            None => {
                trace!(principal = %principal, item = %item_ntiid, "no progress available");
                None
            }
        };
        if let Some(candidate) = &candidate {
            ensure_principal(candidate, principal)?;
        }

        let required = state.is_item_required(Some(item));
        let container = state.completed_mut().get_or_create(principal);

        let previous = container.remove_item(item_ntiid);
        let was_complete = previous.is_some();
        let prev_success = previous.as_ref().is_some_and(CompletedItem::success);
        if let Some(previous) = previous {
            self.events.notify(CompletionEvent::CompletedItemRemoved {
                context: context.ntiid.clone(),
                completed: previous,
            });
        }

        let (is_complete, success) = match candidate {
            Some(completed) => {
                info!(
                    principal = %principal,
                    item = %item_ntiid,
                    context = %context.ntiid,
                    success = completed.success(),
                    "Marking item complete"
                );
                let success = completed.success();
                container.insert(item_ntiid, completed.clone())?;
                self.events.notify(CompletionEvent::CompletedItemAdded {
                    context: context.ntiid.clone(),
                    completed,
                });
                (true, success)
            }
            None => {
                if progress.is_some() {
                    debug!(principal = %principal, item = %item_ntiid, "Item is not complete");
                }
                (false, false)
            }
        };

        if was_complete && !is_complete {
            info!(
                principal = %principal,
                item = %item_ntiid,
                context = %context.ntiid,
                "Removed progress"
            );
        }

        let transition = Transition {
            was_complete,
            prev_success,
            is_complete,
            success,
            notified: false,
        };
        Ok((ReconcileOutcome::Reconciled(transition), required))
    }

    /// Drop the principal's record for `item_ntiid`, if any.
    ///
    /// No policy or progress lookup happens here. Listeners hear about it
    /// only when a successful record of a required item went away.
    pub fn remove_completion<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        item: Option<&CompletableItem>,
        item_ntiid: &Ntiid,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> RemoveOutcome {
        let Some(state) = store.state_mut(context) else {
            warn!(
                context = %context.ntiid,
                principal = %principal,
                item = %item_ntiid,
                "No container found for completion context"
            );
            return RemoveOutcome::MissingContainer;
        };

        let required = state.is_item_required(item);
        let removed = state
            .completed_mut()
            .get_mut(principal)
            .and_then(|container| container.remove_item(item_ntiid));
        let Some(removed) = removed else {
            trace!(principal = %principal, item = %item_ntiid, "nothing to remove");
            return RemoveOutcome::NotPresent;
        };

        self.events.notify(CompletionEvent::CompletedItemRemoved {
            context: context.ntiid.clone(),
            completed: removed.clone(),
        });
        let notified = removed.success() && required;
        if notified {
            self.notify_progress(principal, context);
        }
        RemoveOutcome::Removed {
            completed: removed,
            notified,
        }
    }

    /// Grant completion administratively, replacing any existing record.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::ContextNotFound`] for an unregistered
    /// context.
    pub fn award_completion<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        item: &Arc<CompletableItem>,
        principal: &PrincipalId,
        context: &CompletionContext,
        award: Award,
        completed_date: DateTime<Utc>,
    ) -> Result<Transition, CompletionError> {
        let state = store
            .state_mut(context)
            .ok_or_else(|| CompletionError::ContextNotFound(context.ntiid.clone()))?;

        let required = state.is_item_required(Some(item.as_ref()));
        let awarded = CompletedItem::new(principal.clone(), item, completed_date).with_award(award);
        let container = state.completed_mut().get_or_create(principal);

        let previous = container.remove_item(&**item);
        let was_complete = previous.is_some();
        let prev_success = previous.as_ref().is_some_and(CompletedItem::success);
        if let Some(previous) = previous {
            self.events.notify(CompletionEvent::CompletedItemRemoved {
                context: context.ntiid.clone(),
                completed: previous,
            });
        }

        info!(
            principal = %principal,
            item = %item.ntiid,
            context = %context.ntiid,
            awarder = ?awarded.award().map(|award| award.awarder.as_str()),
            "Awarding completion"
        );
        container.insert(&**item, awarded.clone())?;
        self.events.notify(CompletionEvent::CompletedItemAdded {
            context: context.ntiid.clone(),
            completed: awarded,
        });

        let mut transition = Transition {
            was_complete,
            prev_success,
            is_complete: true,
            success: true,
            notified: false,
        };
        if required && transition.changed() {
            self.notify_progress(principal, context);
            transition.notified = true;
        }
        Ok(transition)
    }

    /// React to the host withdrawing `principal`'s progress on an item.
    ///
    /// This is the reaction to [`CompletionEvent::UserProgressRemoved`], not
    /// its emitter: the host announces the withdrawal. The record is dropped
    /// and rebuilt from whatever progress remains. `CompletedItemRemoved` and
    /// `CompletedItemAdded` fire as usual, but `UserProgressUpdated` fires at
    /// most once, judged on the state before the removal against the state
    /// after the rebuild.
    ///
    /// # Errors
    ///
    /// Propagates errors from the rebuild, after announcing the removal if
    /// it changed a required item.
    pub fn progress_removed<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        item: Option<&CompletableItem>,
        item_ntiid: &Ntiid,
        principal: &PrincipalId,
        context: &CompletionContext,
    ) -> Result<ProgressRemovedOutcome, CompletionError> {
        let Some(state) = store.state_mut(context) else {
            warn!(
                context = %context.ntiid,
                principal = %principal,
                item = %item_ntiid,
                "No container found for completion context"
            );
            return Ok(ProgressRemovedOutcome {
                removed: RemoveOutcome::MissingContainer,
                reconciled: None,
            });
        };

        let required = state.is_item_required(item);
        let previous = state
            .completed_mut()
            .get_mut(principal)
            .and_then(|container| container.remove_item(item_ntiid));
        let was_complete = previous.is_some();
        let prev_success = previous.as_ref().is_some_and(CompletedItem::success);
        let removed = match previous {
            Some(completed) => {
                self.events.notify(CompletionEvent::CompletedItemRemoved {
                    context: context.ntiid.clone(),
                    completed: completed.clone(),
                });
                RemoveOutcome::Removed {
                    completed,
                    notified: false,
                }
            }
            None => RemoveOutcome::NotPresent,
        };

        if item.is_none() {
            info!(
                principal = %principal,
                item = %item_ntiid,
                "Removed progress for an item that no longer resolves"
            );
            return Ok(ProgressRemovedOutcome {
                removed,
                reconciled: None,
            });
        }

        let rebuilt = match self.reconcile_item(store, item, item_ntiid, principal, context, false) {
            Ok((outcome, _)) => outcome,
            Err(err) => {
                if required && was_complete {
                    self.notify_progress(principal, context);
                }
                return Err(err);
            }
        };
        let (is_complete, success) = match rebuilt {
            ReconcileOutcome::Reconciled(after) => (after.is_complete, after.success),
            ReconcileOutcome::MissingContainer | ReconcileOutcome::Unchanged => (false, false),
        };

        let mut transition = Transition {
            was_complete,
            prev_success,
            is_complete,
            success,
            notified: false,
        };
        if required && transition.changed() {
            self.notify_progress(principal, context);
            transition.notified = true;
        }
        Ok(ProgressRemovedOutcome {
            removed,
            reconciled: Some(ReconcileOutcome::Reconciled(transition)),
        })
    }

    /// Replace the policy deciding completion of the context itself.
    ///
    /// Returns the previous policy.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::ContextNotFound`] for an unregistered
    /// context.
    pub fn set_context_policy<S: ContextStore + ?Sized>(
        &self,
        store: &mut S,
        context: &CompletionContext,
        policy: Arc<dyn CompletionPolicy>,
        notify: bool,
    ) -> Result<Option<Arc<dyn CompletionPolicy>>, CompletionError> {
        let state = store
            .state_mut(context)
            .ok_or_else(|| CompletionError::ContextNotFound(context.ntiid.clone()))?;
        let previous = state.policies_mut().set_context_policy(policy);
        debug!(context = %context.ntiid, notify, "context policy updated");
        if notify {
            self.events.notify(CompletionEvent::ContextPolicyUpdated {
                context: context.ntiid.clone(),
            });
        }
        Ok(previous)
    }

    /// Per-item override on the context, then the registry.
    fn item_policy(
        &self,
        state: &ContextContainers,
        item_ntiid: &Ntiid,
        item: &CompletableItem,
        context: &CompletionContext,
    ) -> Option<Arc<dyn CompletionPolicy>> {
        state
            .policies()
            .get(item_ntiid)
            .cloned()
            .or_else(|| self.policies.policy_for(item, context))
    }

    /// The context's own policy, then whatever the registry has for the
    /// context viewed as an item.
    pub(crate) fn context_policy(
        &self,
        state: &ContextContainers,
        context: &CompletionContext,
    ) -> Option<Arc<dyn CompletionPolicy>> {
        state
            .policies()
            .context_policy()
            .cloned()
            .or_else(|| self.policies.policy_for(&context.as_item(), context))
    }

    fn notify_progress(&self, principal: &PrincipalId, context: &CompletionContext) {
        self.events.notify(CompletionEvent::UserProgressUpdated {
            context: context.ntiid.clone(),
            principal: principal.clone(),
        });
    }
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

/// Whether `item` counts toward the context's completion. Unknown contexts
/// require nothing.
#[must_use]
pub fn is_item_required<S: ContextStore + ?Sized>(
    store: &S,
    item: Option<&CompletableItem>,
    context: &CompletionContext,
) -> bool {
    store
        .state(context)
        .is_some_and(|state| state.is_item_required(item))
}

#[must_use]
pub fn get_completed_item<'s, S: ContextStore + ?Sized>(
    store: &'s S,
    principal: &PrincipalId,
    context: &CompletionContext,
    item: &impl ItemKey,
) -> Option<&'s CompletedItem> {
    store
        .state(context)?
        .completed()
        .get(principal)?
        .get_completed_item(item)
}

fn policy_not_found(item_ntiid: &Ntiid, context: &CompletionContext) -> CompletionError {
    CompletionError::PolicyNotFound {
        item: item_ntiid.clone(),
        context: context.ntiid.clone(),
    }
}

fn ensure_principal(completed: &CompletedItem, principal: &PrincipalId) -> Result<(), CompletionError> {
    if completed.principal().matches(principal) {
        Ok(())
    } else {
        Err(CompletionError::PrincipalMismatch {
            expected: principal.clone(),
            actual: completed.principal().clone(),
            item: completed.item_ntiid().clone(),
        })
    }
}
