//! Cancel-and-restart delay that fires once on quiescence.
//!
//! A `Debounce` is passive: it only records a deadline. The owner's event
//! loop awaits [`until`] on that deadline and calls [`Debounce::fire`] when
//! it elapses, which keeps all timers in one `select!` and means dropping
//! the owner cancels everything.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start the window, or push an already pending deadline back.
    pub fn restart(&mut self) {
        self.restart_after(self.window);
    }

    /// Like `restart`, but with a one-off window length.
    pub fn restart_after(&mut self, window: Duration) {
        self.deadline = Some(Instant::now() + window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending deadline. Returns false if nothing was pending.
    pub fn fire(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// Sleep until `deadline`, or forever if there is none.
pub async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
