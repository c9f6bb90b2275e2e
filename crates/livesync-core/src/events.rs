//! Event infrastructure for livesync-core.
//!
//! Provides `SessionEvent` for the status surface and monitoring, and
//! `EventBus` for subscriptions. Events are purely observational: nothing
//! in the session depends on whether anyone is listening.

use crate::error::ErrorKind;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Short-lived notifications shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusSignal {
    Saved,
    Reloading,
    Merged,
}

/// Events emitted by a running session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A status signal became visible.
    StatusShown { signal: StatusSignal },
    /// A status signal auto-cleared.
    StatusCleared { signal: StatusSignal },
    /// An external change was folded into the buffer.
    Reconciled {
        /// True for a plain reload, false for a merge.
        reloaded: bool,
        /// Hunks placed during a merge.
        #[serde(rename = "hunksApplied")]
        applied: usize,
        /// Hunks that could not be located and were dropped.
        #[serde(rename = "hunksSkipped")]
        skipped: usize,
    },
    /// The buffer was written back to the file.
    Saved {
        /// Bytes written.
        size: u64,
    },
    /// A pass failed. The session keeps running.
    Failed { kind: ErrorKind, message: String },
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Event bus for publishing session events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(SessionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds a read lock.
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // Snapshot so a callback may subscribe without deadlocking.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}
