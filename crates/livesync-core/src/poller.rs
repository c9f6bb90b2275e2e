//! Change detection by polling the file's modification stamp.
//!
//! Ticks are cheap (`stat` only). A changed stamp starts a short debounce so
//! that a burst of saves from another program collapses into one read of the
//! final content.

use crate::debounce::Debounce;
use crate::handle::ModificationStamp;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

#[derive(Debug)]
pub struct ChangePoller {
    debounce: Debounce,
    last_seen: Option<ModificationStamp>,
}

impl ChangePoller {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce: Debounce::new(debounce),
            last_seen: None,
        }
    }

    /// Tick source for polling. A tick missed while a pass was running is
    /// skipped rather than replayed.
    pub fn interval(period: Duration) -> Interval {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    /// Feed one tick's stamp. Returns true if it differs from `known` and the
    /// debounce was (re)started.
    pub fn observe(
        &mut self,
        current: ModificationStamp,
        known: Option<ModificationStamp>,
    ) -> bool {
        if Some(current) == known {
            self.last_seen = Some(current);
            return false;
        }
        if self.last_seen == Some(current) && self.debounce.is_pending() {
            // Same change seen again on a faster tick; keep the deadline.
            return true;
        }
        if self.last_seen != Some(current) {
            debug!(?current, ?known, "Modification stamp changed");
        }
        self.last_seen = Some(current);
        self.debounce.restart();
        true
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// The debounce elapsed. Returns true if a reconciliation pass is due.
    pub fn fire(&mut self) -> bool {
        self.debounce.fire()
    }

    pub fn cancel(&mut self) {
        self.debounce.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::until;

    #[test]
    fn test_unchanged_stamp_does_not_arm() {
        let mut poller = ChangePoller::new(Duration::from_millis(200));
        let stamp = ModificationStamp(3);
        assert!(!poller.observe(stamp, Some(stamp)));
        assert!(!poller.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_stamp_arms_debounce() {
        let mut poller = ChangePoller::new(Duration::from_millis(200));
        let started = Instant::now();
        assert!(poller.observe(ModificationStamp(4), Some(ModificationStamp(3))));

        until(poller.deadline()).await;
        assert!(poller.fire());
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert!(!poller.fire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_changes_restart_window() {
        let mut poller = ChangePoller::new(Duration::from_millis(200));
        let started = Instant::now();
        poller.observe(ModificationStamp(4), Some(ModificationStamp(3)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        poller.observe(ModificationStamp(5), Some(ModificationStamp(3)));

        until(poller.deadline()).await;
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_stamp_keeps_deadline() {
        let mut poller = ChangePoller::new(Duration::from_millis(200));
        let started = Instant::now();
        poller.observe(ModificationStamp(4), Some(ModificationStamp(3)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(poller.observe(ModificationStamp(4), Some(ModificationStamp(3))));

        until(poller.deadline()).await;
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_cancel_clears_pending() {
        let mut poller = ChangePoller::new(Duration::from_millis(200));
        poller.observe(ModificationStamp(2), None);
        poller.cancel();
        assert!(!poller.fire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_skips_missed_ticks() {
        let mut interval = ChangePoller::interval(Duration::from_millis(100));
        let started = Instant::now();
        interval.tick().await;
        tokio::time::sleep(Duration::from_millis(350)).await;
        interval.tick().await;
        interval.tick().await;
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }
}
