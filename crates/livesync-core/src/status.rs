//! Transient status signals (saved / reloading / merged).

use crate::debounce::Debounce;
use crate::events::{EventBus, SessionEvent, StatusSignal};
use std::time::Duration;
use tokio::time::Instant;

/// The currently visible signal and its auto-clear timer.
///
/// Showing a new signal replaces the old one without a `StatusCleared` for
/// it; the status surface only ever displays one.
#[derive(Debug)]
pub struct TransientStatus {
    current: Option<StatusSignal>,
    clear: Debounce,
}

impl TransientStatus {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            current: None,
            clear: Debounce::new(clear_after),
        }
    }

    pub fn current(&self) -> Option<StatusSignal> {
        self.current
    }

    /// Show `signal` and clear it after the default window.
    pub fn show(&mut self, signal: StatusSignal, events: &EventBus) {
        self.hold(signal, events);
        self.clear.restart();
    }

    /// Show `signal` without arming the clear timer; call [`arm`](Self::arm)
    /// once whatever it announces has finished.
    pub fn hold(&mut self, signal: StatusSignal, events: &EventBus) {
        self.current = Some(signal);
        self.clear.cancel();
        events.emit(SessionEvent::StatusShown { signal });
    }

    /// Clear the current signal after `after`.
    pub fn arm(&mut self, after: Duration) {
        if self.current.is_some() {
            self.clear.restart_after(after);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.clear.deadline()
    }

    /// The clear timer elapsed.
    pub fn expire(&mut self, events: &EventBus) {
        if !self.clear.fire() {
            return;
        }
        if let Some(signal) = self.current.take() {
            events.emit(SessionEvent::StatusCleared { signal });
        }
    }

    pub fn cancel(&mut self) {
        self.clear.cancel();
        self.current = None;
    }
}
