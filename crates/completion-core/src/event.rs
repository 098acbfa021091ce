//! Completion events and the sinks that receive them.
//!
//! The engine is the only producer. Sinks are fire-and-forget: `notify`
//! returns nothing and the engine never waits for acknowledgment.
//!
//! Within a single reconciliation, `CompletedItemRemoved` is always delivered
//! before `CompletedItemAdded` for the same item, and both precede the
//! context-scoped `UserProgressUpdated`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::model::{CompletedItem, Ntiid, PrincipalId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CompletionEvent {
    /// A record entered a principal container.
    CompletedItemAdded {
        context: Ntiid,
        completed: CompletedItem,
    },
    /// A record left a principal container.
    CompletedItemRemoved {
        context: Ntiid,
        completed: CompletedItem,
    },
    /// The principal's completion state within `context` changed.
    UserProgressUpdated {
        context: Ntiid,
        principal: PrincipalId,
    },
    /// Progress for `item` was withdrawn by the host.
    UserProgressRemoved {
        item: Ntiid,
        principal: PrincipalId,
        context: Ntiid,
    },
    /// The principal completed the whole context for the first time.
    ContextCompleted {
        context: Ntiid,
        completed: CompletedItem,
    },
    ContextPolicyUpdated { context: Ntiid },
}

impl CompletionEvent {
    /// Dotted event name, stable across releases.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CompletedItemAdded { .. } => "completed_item.added",
            Self::CompletedItemRemoved { .. } => "completed_item.removed",
            Self::UserProgressUpdated { .. } => "progress.updated",
            Self::UserProgressRemoved { .. } => "progress.removed",
            Self::ContextCompleted { .. } => "context.completed",
            Self::ContextPolicyUpdated { .. } => "context.policy_updated",
        }
    }

    #[must_use]
    pub const fn context(&self) -> &Ntiid {
        match self {
            Self::CompletedItemAdded { context, .. }
            | Self::CompletedItemRemoved { context, .. }
            | Self::UserProgressUpdated { context, .. }
            | Self::UserProgressRemoved { context, .. }
            | Self::ContextCompleted { context, .. }
            | Self::ContextPolicyUpdated { context } => context,
        }
    }
}

impl fmt::Display for CompletionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.context())
    }
}

pub trait EventSink: Send + Sync {
    fn notify(&self, event: CompletionEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn notify(&self, _event: CompletionEvent) {}
}

/// Keeps every event in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CompletionEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain and return the events seen so far.
    pub fn take(&self) -> Vec<CompletionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn notify(&self, event: CompletionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Fans every event out to each subscribed sink, in subscription order.
#[derive(Default, Clone)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventSink for EventBus {
    fn notify(&self, event: CompletionEvent) {
        tracing::trace!(event = %event, sinks = self.sinks.len(), "dispatching completion event");
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}
