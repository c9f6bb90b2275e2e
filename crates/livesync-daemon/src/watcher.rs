//! Debounced watcher for the mirror file.
//!
//! Uses notify-debouncer-mini on the mirror's directory and reports only
//! events for the mirror itself.

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Change to the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEvent {
    /// Created or modified
    Modified,
    Deleted,
}

/// Watches a single file by watching its parent directory.
pub struct FileWatcher {
    path: PathBuf,
    /// Debouncer handle (must keep alive)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<MirrorEvent>,
}

/// Last seen mtime, to drop events that did not change the file.
type LastMtime = Arc<Mutex<Option<SystemTime>>>;

impl FileWatcher {
    /// Watch `path`. Events are debounced over `window` (200ms in the daemon)
    /// so an editor's save-by-rename arrives as one change.
    pub fn new(path: &Path, window: Duration) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // Canonicalize the directory: on macOS /var/folders/... is really
        // /private/var/folders/..., and FSEvents reports the real path.
        let dir = dir.canonicalize().unwrap_or(dir);
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("{} has no file name", path.display()))?
            .to_owned();
        let path = dir.join(&file_name);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watched = path.clone();
        let last_mtime: LastMtime = Arc::new(Mutex::new(None));

        let mut debouncer = new_debouncer(
            window,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    let relevant = events.iter().any(|event| event.path == watched);
                    if !relevant {
                        return;
                    }
                    if let Some(event) = Self::classify(&watched, &last_mtime) {
                        // Receiver dropped means the daemon is shutting down.
                        let _ = event_tx.send(event);
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
        )?;

        debouncer.watcher().watch(&dir, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), "Watching mirror");

        Ok(Self {
            path,
            _debouncer: debouncer,
            event_rx,
        })
    }

    fn classify(path: &Path, last_mtime: &LastMtime) -> Option<MirrorEvent> {
        let mut last = last_mtime.lock().unwrap_or_else(|e| e.into_inner());

        let Ok(metadata) = std::fs::metadata(path) else {
            *last = None;
            return Some(MirrorEvent::Deleted);
        };

        if let Ok(mtime) = metadata.modified() {
            if *last == Some(mtime) {
                // Spurious event (e.g. Docker volumes); nothing changed.
                return None;
            }
            *last = Some(mtime);
        }
        Some(MirrorEvent::Modified)
    }

    pub fn event_rx(&mut self) -> &mut mpsc::UnboundedReceiver<MirrorEvent> {
        &mut self.event_rx
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
