//! Reconciliation of external changes with the local buffer.
//!
//! The `Reconciler` owns the baseline: the text believed to match the file
//! as it was last confirmed by a read or a successful write. Given the
//! local buffer and a fresh snapshot it decides between doing nothing,
//! reloading (nothing local to preserve) and merging (replaying the external
//! change onto the local buffer as a patch).

use crate::handle::{ExternalSnapshot, ModificationStamp};
use crate::patch::{self, PatchConfig};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    /// A snapshot is being read.
    Detecting,
    Reloading,
    Merging,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The snapshot's stamp is the one already recorded.
    Unchanged,
    /// The stamp moved but the content equals the baseline.
    Touched,
    /// There were no local edits; the buffer should become `text`.
    Reloaded { text: String },
    /// Local edits were kept and the external change patched in. `applied`
    /// has one entry per hunk.
    Merged { text: String, applied: Vec<bool> },
}

impl Outcome {
    /// The text the buffer should now hold, if it changes.
    pub fn replacement(&self) -> Option<&str> {
        match self {
            Outcome::Reloaded { text } | Outcome::Merged { text, .. } => Some(text),
            Outcome::Unchanged | Outcome::Touched => None,
        }
    }
}

#[derive(Debug)]
pub struct Reconciler {
    baseline: String,
    stamp: Option<ModificationStamp>,
    state: ReconcileState,
    config: PatchConfig,
}

impl Reconciler {
    pub fn new(config: PatchConfig) -> Self {
        Self {
            baseline: String::new(),
            stamp: None,
            state: ReconcileState::Idle,
            config,
        }
    }

    /// Adopt the initial snapshot when a file is opened.
    pub fn load(&mut self, snapshot: ExternalSnapshot) {
        self.baseline = snapshot.text;
        self.stamp = Some(snapshot.stamp);
        self.state = ReconcileState::Idle;
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn stamp(&self) -> Option<ModificationStamp> {
        self.stamp
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// Whether `stamp` differs from the last confirmed one.
    pub fn is_stale(&self, stamp: ModificationStamp) -> bool {
        self.stamp != Some(stamp)
    }

    /// Mark the start of a pass, before the snapshot is read.
    pub fn detect(&mut self) {
        self.state = ReconcileState::Detecting;
    }

    /// Abandon a pass that failed before `reconcile` ran.
    pub fn abort(&mut self) {
        self.state = ReconcileState::Idle;
    }

    /// Fold `snapshot` into `local`. Baseline and stamp move to the
    /// snapshot in every branch except `Unchanged`.
    pub fn reconcile(&mut self, local: &str, snapshot: ExternalSnapshot) -> Outcome {
        let outcome = if !self.is_stale(snapshot.stamp) {
            Outcome::Unchanged
        } else if snapshot.text == self.baseline {
            self.stamp = Some(snapshot.stamp);
            Outcome::Touched
        } else if local == self.baseline {
            self.state = ReconcileState::Reloading;
            debug!(name = %snapshot.name, "No local edits, reloading");
            self.commit(&snapshot);
            Outcome::Reloaded {
                text: snapshot.text,
            }
        } else {
            self.state = ReconcileState::Merging;
            let patch = patch::diff(&self.baseline, &snapshot.text, &self.config);
            let (text, applied) = patch::apply(&patch, local, &self.config);
            debug!(
                name = %snapshot.name,
                hunks = patch.len(),
                "Merged external change into local edits"
            );
            self.commit(&snapshot);
            Outcome::Merged { text, applied }
        };

        self.state = ReconcileState::Idle;
        outcome
    }

    /// Record a successful write of `text`.
    pub fn advance(&mut self, text: String, stamp: ModificationStamp) {
        self.baseline = text;
        self.stamp = Some(stamp);
    }

    fn commit(&mut self, snapshot: &ExternalSnapshot) {
        self.baseline.clone_from(&snapshot.text);
        self.stamp = Some(snapshot.stamp);
    }
}
