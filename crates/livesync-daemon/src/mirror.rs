//! File-backed editing surface.
//!
//! The daemon has no editor of its own. Instead it keeps a *mirror*: a
//! working copy next to the synced file that the user edits with any tool.
//! The session writes reloaded and merged text into the mirror, and edits
//! saved to the mirror flow back into the session.

use crate::watcher::MirrorEvent;
use anyhow::{Context, Result};
use livesync_core::{EditingSurface, SessionHandle, SessionInput};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// First free sidecar path for `original`: `<stem>.livesync.<ext>`, then
/// `<stem>.livesync-2.<ext>` up to `-100`.
pub fn mirror_path(original: &Path) -> io::Result<PathBuf> {
    let dir = match original.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = original
        .file_stem()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing file stem"))?;

    let ext = original.extension();
    for n in 1..=100usize {
        let mut name = OsString::new();
        name.push(stem);
        name.push(".livesync");
        if n > 1 {
            name.push(format!("-{n}"));
        }
        if let Some(ext) = ext {
            name.push(".");
            name.push(ext);
        }

        let candidate = dir.join(&name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "too many mirror files",
    ))
}

/// A working copy on disk, with its last known content cached.
///
/// Reads and writes use blocking `std::fs` calls on the caller's thread. The
/// mirror is one small sidecar file, so each call is a single short syscall
/// sequence and stays well below the session's timer granularity.
pub struct MirrorSurface {
    path: PathBuf,
    state: Mutex<MirrorState>,
}

#[derive(Default)]
struct MirrorState {
    /// What the session last saw in the mirror.
    text: String,
    /// What the watcher path last reported as an edit (or what we wrote).
    /// Kept apart from `text` so an edit picked up early by `text()` is
    /// still announced once the watcher catches up.
    announced: String,
    cursor: usize,
    /// Set by the first `set_text`, which replaces whatever the mirror held.
    primed: bool,
}

impl MirrorSurface {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(MirrorState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pick up the mirror's content from disk. Returns true if it differs
    /// from what was last announced, i.e. the user edited it. Our own
    /// writes read back identical and are ignored.
    pub async fn absorb_from_disk(&self) -> Result<bool> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading mirror {}", self.path.display()))?;

        let mut state = self.lock();
        if state.announced == text {
            return Ok(false);
        }
        state.cursor = state.cursor.min(text.chars().count());
        state.text.clone_from(&text);
        state.announced = text;
        Ok(true)
    }

    /// Refresh the cached text from disk. A missing or unreadable mirror
    /// keeps the cache.
    fn refresh(&self, state: &mut MirrorState) {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text != state.text => {
                debug!(path = %self.path.display(), "Mirror changed ahead of the watcher");
                state.cursor = state.cursor.min(text.chars().count());
                state.text = text;
            }
            Ok(_) => {}
            Err(e) => debug!(path = %self.path.display(), error = %e, "Mirror not readable"),
        }
    }

    /// Act on a watcher event: an edit is passed to the session, a deleted
    /// mirror is recreated. Returns false if an edit was lost because the
    /// session has already ended.
    pub async fn handle_event(&self, event: MirrorEvent, session: &SessionHandle) -> bool {
        match event {
            MirrorEvent::Modified => match self.absorb_from_disk().await {
                Ok(true) => {
                    debug!("Mirror edited");
                    if !session.send(SessionInput::Edited) {
                        warn!(path = %self.path.display(), "Session has ended, mirror edit was not synced");
                        return false;
                    }
                }
                Ok(false) => {}
                Err(e) => warn!("{:#}", e),
            },
            MirrorEvent::Deleted => {
                warn!("Mirror was deleted, restoring it");
                if let Err(e) = self.restore() {
                    error!("{:#}", e);
                }
            }
        }
        true
    }

    /// Recreate the mirror from the cached text (e.g. after it was deleted).
    pub fn restore(&self) -> Result<()> {
        let text = self.lock().text.clone();
        std::fs::write(&self.path, text)
            .with_context(|| format!("restoring mirror {}", self.path.display()))
    }

    /// Delete the mirror file.
    pub fn remove(&self) -> Result<()> {
        std::fs::remove_file(&self.path)
            .with_context(|| format!("removing mirror {}", self.path.display()))
    }
}

impl EditingSurface for MirrorSurface {
    /// The mirror as it is on disk now, not as the watcher last saw it: a
    /// save the watcher has not reported yet still counts as a local edit.
    fn text(&self) -> String {
        let mut state = self.lock();
        self.refresh(&mut state);
        state.text.clone()
    }

    /// Replace the mirror's content, unless the user saved it since the
    /// session last looked: local edits are never overwritten. The skipped
    /// edit is left unannounced so the watcher feeds it back as an edit.
    fn set_text(&self, text: &str) {
        let mut state = self.lock();
        let primed = std::mem::replace(&mut state.primed, true);
        if let Some(on_disk) = primed
            .then(|| std::fs::read_to_string(&self.path).ok())
            .flatten()
        {
            if on_disk != state.text && on_disk != text {
                warn!(path = %self.path.display(), "Mirror edited during update, keeping the edit");
                state.cursor = state.cursor.min(on_disk.chars().count());
                state.text = on_disk;
                return;
            }
        }
        // Hold the lock across the write so `text()` never sees it half done.
        match std::fs::write(&self.path, text) {
            Ok(()) => debug!(path = %self.path.display(), "Updated mirror"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to update mirror"),
        }
        state.text = text.to_string();
        state.announced = text.to_string();
    }

    fn cursor_offset(&self) -> usize {
        self.lock().cursor
    }

    fn set_cursor_offset(&self, offset: usize) {
        self.lock().cursor = offset;
    }
}
