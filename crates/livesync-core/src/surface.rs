//! Editing surface abstraction.
//!
//! The surface is whatever holds the user's buffer: a rich-text editor, a
//! plain-text view, or (in the daemon) a mirror file. The session only ever
//! talks to it through this trait; the surface reports changes back as
//! [`SessionInput`]s.

use std::sync::{Arc, Mutex, MutexGuard};

/// Notifications from the host to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// The buffer changed.
    Edited,
    /// The user focused the plain-text (markdown source) view.
    FocusPlainText,
    /// The user switched back to the rich-text view.
    FocusRichText,
    /// Focus left the editor entirely.
    Blur,
    /// The surface finished laying out text set by the session.
    LayoutSettled,
    /// Save immediately instead of waiting for quiescence.
    SaveNow,
    /// The user re-granted file access after it was revoked.
    Regrant,
}

pub trait EditingSurface: Send + Sync {
    fn text(&self) -> String;

    fn set_text(&self, text: &str);

    /// Cursor position in chars.
    fn cursor_offset(&self) -> usize;

    fn set_cursor_offset(&self, offset: usize);

    /// Whether the user-visible document is empty. Used to tell a genuinely
    /// empty document from a serializer that lost the content.
    fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    /// Whether `set_text` is laid out asynchronously. If so, the session
    /// waits for [`SessionInput::LayoutSettled`] before restoring the cursor.
    fn defers_layout(&self) -> bool {
        false
    }
}

/// In-memory surface for testing. Clones share state.
#[derive(Clone, Default)]
pub struct MemorySurface {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    text: String,
    cursor: usize,
    defers_layout: bool,
    blank_override: Option<bool>,
    replacements: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that lays out asynchronously, like a rich-text editor.
    pub fn with_deferred_layout() -> Self {
        let surface = Self::new();
        surface.lock().defers_layout = true;
        surface
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate the user typing: replace the text and move the cursor to
    /// the end. Does not count as a session replacement.
    pub fn type_text(&self, text: &str) {
        let mut state = self.lock();
        state.text = text.to_string();
        state.cursor = text.chars().count();
    }

    /// Force `is_blank` to report a value regardless of the text.
    pub fn set_blank_override(&self, blank: Option<bool>) {
        self.lock().blank_override = blank;
    }

    /// How many times the session replaced the text.
    pub fn replacements(&self) -> usize {
        self.lock().replacements
    }
}

impl EditingSurface for MemorySurface {
    fn text(&self) -> String {
        self.lock().text.clone()
    }

    fn set_text(&self, text: &str) {
        let mut state = self.lock();
        state.text = text.to_string();
        state.replacements += 1;
        if state.defers_layout {
            // Layout resets the selection until the host restores it.
            state.cursor = 0;
        }
    }

    fn cursor_offset(&self) -> usize {
        self.lock().cursor
    }

    fn set_cursor_offset(&self, offset: usize) {
        self.lock().cursor = offset;
    }

    fn is_blank(&self) -> bool {
        let state = self.lock();
        state
            .blank_override
            .unwrap_or_else(|| state.text.trim().is_empty())
    }

    fn defers_layout(&self) -> bool {
        self.lock().defers_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_moves_cursor_to_end() {
        let surface = MemorySurface::new();
        surface.type_text("héllo");
        assert_eq!(surface.cursor_offset(), 5);
        assert_eq!(surface.replacements(), 0);
    }

    #[test]
    fn test_blank_detection() {
        let surface = MemorySurface::new();
        surface.type_text("  \n\t");
        assert!(surface.is_blank());

        surface.set_blank_override(Some(false));
        assert!(!surface.is_blank());
    }

    #[test]
    fn test_deferred_layout_resets_cursor() {
        let surface = MemorySurface::with_deferred_layout();
        surface.type_text("abc");
        surface.set_text("abcdef");
        assert!(surface.defers_layout());
        assert_eq!(surface.cursor_offset(), 0);
        assert_eq!(surface.replacements(), 1);
    }
}
