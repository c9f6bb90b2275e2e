//! Autosave on quiescence.
//!
//! Every edit restarts a quiet-period debounce. While the plain-text view is
//! focused a shorter keystroke window also runs; a save that comes due while
//! the user is still mid-keystroke is deferred until the window lapses or
//! focus leaves, so the write never lands between two keystrokes.

use crate::debounce::Debounce;
use crate::error::{Result, SyncError};
use crate::handle::{self, FileHandle, FileStat};
use crate::normalize::normalize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// What to do when the quiet period elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    Save,
    /// Held until the keystroke window lapses or the view loses focus.
    Defer,
}

#[derive(Debug)]
pub struct AutosaveScheduler {
    enabled: bool,
    quiet: Debounce,
    keystroke: Debounce,
    deferred: bool,
}

impl AutosaveScheduler {
    pub fn new(enabled: bool, quiet: Duration, keystroke: Duration) -> Self {
        Self {
            enabled,
            quiet: Debounce::new(quiet),
            keystroke: Debounce::new(keystroke),
            deferred: false,
        }
    }

    /// The buffer changed.
    pub fn on_edit(&mut self, plain_text_focused: bool) {
        if !self.enabled {
            return;
        }
        self.quiet.restart();
        if plain_text_focused {
            self.keystroke.restart();
        }
    }

    pub fn quiet_deadline(&self) -> Option<Instant> {
        self.quiet.deadline()
    }

    pub fn keystroke_deadline(&self) -> Option<Instant> {
        self.keystroke.deadline()
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// The quiet period elapsed.
    pub fn on_quiet_elapsed(&mut self, plain_text_focused: bool) -> SaveDecision {
        self.quiet.fire();
        if plain_text_focused && self.keystroke.is_pending() {
            debug!("Autosave deferred: keystroke window still open");
            self.deferred = true;
            return SaveDecision::Defer;
        }
        self.deferred = false;
        SaveDecision::Save
    }

    /// The keystroke window lapsed. Returns true if a deferred save is due.
    pub fn on_keystroke_elapsed(&mut self) -> bool {
        self.keystroke.fire();
        std::mem::take(&mut self.deferred)
    }

    /// Plain-text focus was lost. Returns true if a deferred save is due.
    pub fn on_blur(&mut self) -> bool {
        self.keystroke.cancel();
        std::mem::take(&mut self.deferred)
    }

    pub fn cancel(&mut self) {
        self.quiet.cancel();
        self.keystroke.cancel();
        self.deferred = false;
    }
}

/// Turn the surface's serialized text into what should be written.
///
/// Returns `None` when the normalized text already matches the baseline.
/// A blank result from a non-blank surface means the serializer lost the
/// content, and is refused.
pub fn prepare(serialized: &str, surface_blank: bool, baseline: &str) -> Result<Option<String>> {
    let normalized = normalize(serialized);
    if normalized.trim().is_empty() && !surface_blank {
        return Err(SyncError::SerializationFault(
            "serialized text is blank but the document is not".into(),
        ));
    }
    if normalized == baseline {
        return Ok(None);
    }
    Ok(Some(normalized))
}

/// Write `text` to the file, aborting the stream on failure.
pub async fn write_back(handle: &dyn FileHandle, text: &str) -> Result<FileStat> {
    handle::write_all(handle, text)
        .await
        .map_err(SyncError::write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::until;
    use crate::error::ErrorKind;
    use crate::handle::InMemoryHandle;

    fn scheduler() -> AutosaveScheduler {
        AutosaveScheduler::new(true, Duration::from_secs(2), Duration::from_millis(750))
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_restart_quiet_period() {
        let mut autosave = scheduler();
        let started = Instant::now();
        autosave.on_edit(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        autosave.on_edit(false);

        until(autosave.quiet_deadline()).await;
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(autosave.on_quiet_elapsed(false), SaveDecision::Save);
        assert!(autosave.quiet_deadline().is_none());
    }

    #[test]
    fn test_disabled_never_arms() {
        let mut autosave =
            AutosaveScheduler::new(false, Duration::from_secs(2), Duration::from_millis(750));
        autosave.on_edit(true);
        assert!(autosave.quiet_deadline().is_none());
        assert!(autosave.keystroke_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_defers_while_keystroke_window_open() {
        let mut autosave =
            AutosaveScheduler::new(true, Duration::from_secs(2), Duration::from_secs(3));
        autosave.on_edit(true);

        until(autosave.quiet_deadline()).await;
        assert_eq!(autosave.on_quiet_elapsed(true), SaveDecision::Defer);
        assert!(autosave.is_deferred());

        until(autosave.keystroke_deadline()).await;
        assert!(autosave.on_keystroke_elapsed());
        assert!(!autosave.is_deferred());
    }

    #[test]
    fn test_blur_releases_deferred_save() {
        let mut autosave = scheduler();
        autosave.on_edit(true);
        assert_eq!(autosave.on_quiet_elapsed(true), SaveDecision::Defer);
        assert!(autosave.on_blur());
        assert!(!autosave.on_blur());
        assert!(autosave.keystroke_deadline().is_none());
    }

    #[test]
    fn test_keystroke_lapse_without_deferral() {
        let mut autosave = scheduler();
        autosave.on_edit(true);
        assert!(!autosave.on_keystroke_elapsed());
    }

    #[test]
    fn test_prepare_normalizes() {
        let prepared = prepare("\\*bold\\*", false, "").unwrap();
        assert_eq!(prepared.as_deref(), Some("*bold*"));
    }

    #[test]
    fn test_prepare_skips_when_equal_to_baseline() {
        assert_eq!(prepare("\\*bold\\*", false, "*bold*").unwrap(), None);
    }

    #[test]
    fn test_prepare_refuses_lost_content() {
        let err = prepare("  \n", false, "real content").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializationFault);
    }

    #[test]
    fn test_prepare_allows_genuinely_empty_document() {
        assert_eq!(prepare("", true, "old").unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_write_back() {
        let handle = InMemoryHandle::new("note.md", "old");
        let stat = write_back(&handle, "new").await.unwrap();
        assert_eq!(handle.text(), "new");
        assert_eq!(stat.size, 3);

        handle.set_fail_writes(true);
        let err = write_back(&handle, "newer").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
        assert_eq!(handle.text(), "new");
    }
}
