//! Session timing and merge configuration.

use crate::patch::PatchConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a sync session. All windows are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How often the file's modification stamp is checked.
    pub poll_interval_ms: u64,
    /// Quiet period after a stamp change before the file is read.
    pub poll_debounce_ms: u64,
    /// Quiet period after the last edit before autosaving.
    pub autosave_ms: u64,
    /// While the plain-text view is focused, saves wait until no key has
    /// been pressed for this long.
    pub keystroke_window_ms: u64,
    /// How long saved/merged signals stay visible.
    pub status_clear_ms: u64,
    /// How long the reloading signal stays visible after the cursor is
    /// restored.
    pub reload_clear_ms: u64,
    pub autosave: bool,
    pub patch: PatchConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1500,
            poll_debounce_ms: 200,
            autosave_ms: 2000,
            keystroke_window_ms: 750,
            status_clear_ms: 1000,
            reload_clear_ms: 500,
            autosave: true,
            patch: PatchConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero period would make `tokio::time::interval` panic.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn poll_debounce(&self) -> Duration {
        Duration::from_millis(self.poll_debounce_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_ms)
    }

    pub fn keystroke_window(&self) -> Duration {
        Duration::from_millis(self.keystroke_window_ms)
    }

    pub fn status_clear(&self) -> Duration {
        Duration::from_millis(self.status_clear_ms)
    }

    pub fn reload_clear(&self) -> Duration {
        Duration::from_millis(self.reload_clear_ms)
    }
}
