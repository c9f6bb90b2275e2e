//! The sync session: one task that keeps a surface and a file in step.
//!
//! `Session::run` owns every timer (poll interval, poll debounce, autosave,
//! keystroke window, status clear) in a single `select!`. Work between
//! awaits runs to completion, so the only concurrency to manage is between
//! a pass awaiting I/O and the session being shut down; that I/O is raced
//! against the session's `CancellationToken` and a cancelled pass commits
//! nothing.

use crate::autosave::{self, AutosaveScheduler, SaveDecision};
use crate::config::SessionConfig;
use crate::debounce::until;
use crate::error::{Result, SyncError};
use crate::events::{EventBus, SessionEvent, StatusSignal};
use crate::guard::{FlightKind, SessionGuard};
use crate::handle::{AccessMode, FileHandle, FileStat, Permission};
use crate::poller::ChangePoller;
use crate::reconcile::{Outcome, Reconciler};
use crate::status::TransientStatus;
use crate::surface::{EditingSurface, SessionInput};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Session {
    handle: Arc<dyn FileHandle>,
    surface: Arc<dyn EditingSurface>,
    config: SessionConfig,
    events: Arc<EventBus>,
    cancel: CancellationToken,
    reconciler: Reconciler,
    guard: SessionGuard,
    poller: ChangePoller,
    autosave: AutosaveScheduler,
    status: TransientStatus,
    /// Cursor offset to restore once the surface has laid out new text.
    pending_cursor: Option<usize>,
    /// Set after a permission failure; cleared by a successful re-grant.
    suspended: bool,
}

impl Session {
    /// Request access, load the file into the surface and adopt it as the
    /// baseline.
    pub async fn open(
        handle: Arc<dyn FileHandle>,
        surface: Arc<dyn EditingSurface>,
        config: SessionConfig,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let permission = handle
            .request_permission(AccessMode::ReadWrite)
            .await
            .map_err(SyncError::read)?;
        if permission == Permission::Denied {
            return Err(SyncError::PermissionDenied(
                "read/write access was not granted".into(),
            ));
        }

        let snapshot = handle.read().await.map_err(SyncError::read)?;
        info!(name = %snapshot.name, size = snapshot.size, "Opened document");

        surface.set_text(&snapshot.text);
        let mut reconciler = Reconciler::new(config.patch.clone());
        reconciler.load(snapshot);

        Ok(Self {
            reconciler,
            guard: SessionGuard::new(),
            poller: ChangePoller::new(config.poll_debounce()),
            autosave: AutosaveScheduler::new(
                config.autosave,
                config.autosave_delay(),
                config.keystroke_window(),
            ),
            status: TransientStatus::new(config.status_clear()),
            pending_cursor: None,
            suspended: false,
            cancel: CancellationToken::new(),
            handle,
            surface,
            config,
            events,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn baseline(&self) -> &str {
        self.reconciler.baseline()
    }

    /// Run the session on a new task.
    pub fn spawn(self) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.cancellation_token();
        let task = tokio::spawn(self.run(rx));
        SessionHandle {
            inputs: tx,
            cancel,
            task,
        }
    }

    /// Drive the session until cancelled or the input channel closes.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        let cancel = self.cancel.clone();
        let mut ticker = ChangePoller::interval(self.config.poll_interval());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                input = inputs.recv() => match input {
                    Some(input) => self.handle_input(input).await,
                    None => {
                        debug!("Input channel closed");
                        break;
                    }
                },

                _ = ticker.tick() => self.poll().await,

                _ = until(self.poller.deadline()) => {
                    if self.poller.fire() {
                        self.reconcile_pass().await;
                    }
                }

                _ = until(self.autosave.quiet_deadline()) => {
                    let focused = self.guard.is_plain_text_focused();
                    if self.autosave.on_quiet_elapsed(focused) == SaveDecision::Save {
                        self.save().await;
                    }
                }

                _ = until(self.autosave.keystroke_deadline()) => {
                    if self.autosave.on_keystroke_elapsed() {
                        self.save().await;
                    }
                }

                _ = until(self.status.deadline()) => self.status.expire(&self.events),
            }
        }

        self.teardown();
    }

    async fn handle_input(&mut self, input: SessionInput) {
        debug!(?input, "Session input");
        match input {
            SessionInput::Edited => {
                self.autosave.on_edit(self.guard.is_plain_text_focused());
            }
            SessionInput::FocusPlainText => self.guard.focus_plain_text(),
            SessionInput::FocusRichText | SessionInput::Blur => {
                self.guard.blur_plain_text();
                if self.autosave.on_blur() {
                    self.save().await;
                }
            }
            SessionInput::LayoutSettled => self.restore_cursor(),
            SessionInput::SaveNow => self.save().await,
            SessionInput::Regrant => self.regrant().await,
        }
    }

    async fn poll(&mut self) {
        if self.suspended {
            return;
        }
        let handle = Arc::clone(&self.handle);
        let stat = race(&self.cancel, async {
            handle.stat().await.map_err(SyncError::read)
        })
        .await;

        match stat {
            Ok(stat) => {
                self.poller.observe(stat.stamp, self.reconciler.stamp());
            }
            Err(err) => self.fail(err),
        }
    }

    async fn reconcile_pass(&mut self) {
        if self.suspended {
            return;
        }
        if self.guard.is_plain_text_focused() {
            // Stamp left alone, so the next tick notices the change again.
            debug!("Plain-text editing active, deferring reconciliation");
            return;
        }
        let Some(flight) = self.guard.try_begin(FlightKind::Reconcile) else {
            return;
        };
        let result = self.reconcile_inner().await;
        self.guard.finish(flight);

        if let Err(err) = result {
            self.fail(err);
        }
    }

    async fn reconcile_inner(&mut self) -> Result<()> {
        self.reconciler.detect();
        let handle = Arc::clone(&self.handle);
        let read = race(&self.cancel, async {
            handle.read().await.map_err(SyncError::read)
        })
        .await;
        let snapshot = match read {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.reconciler.abort();
                return Err(err);
            }
        };

        let local = self.surface.text();
        match self.reconciler.reconcile(&local, snapshot) {
            Outcome::Unchanged => {}
            Outcome::Touched => debug!("Stamp changed without content change"),
            Outcome::Reloaded { text } => {
                info!("Reloaded external change");
                self.status.hold(StatusSignal::Reloading, &self.events);
                self.replace_surface(&text);
                self.events.emit(SessionEvent::Reconciled {
                    reloaded: true,
                    applied: 0,
                    skipped: 0,
                });
            }
            Outcome::Merged { text, applied } => {
                let placed = applied.iter().filter(|ok| **ok).count();
                let skipped = applied.len() - placed;
                if skipped > 0 {
                    warn!(placed, skipped, "Some external changes could not be placed");
                } else {
                    info!(hunks = placed, "Merged external change into local edits");
                }
                self.replace_surface(&text);
                self.status.show(StatusSignal::Merged, &self.events);
                self.events.emit(SessionEvent::Reconciled {
                    reloaded: false,
                    applied: placed,
                    skipped,
                });
                // The merged buffer still carries local edits to persist.
                self.autosave.on_edit(false);
            }
        }
        Ok(())
    }

    /// Swap the surface's text, then restore the cursor (now, or once the
    /// surface reports layout has settled).
    fn replace_surface(&mut self, text: &str) {
        let offset = self.surface.cursor_offset();
        if self.surface.text() != text {
            self.surface.set_text(text);
        }
        self.pending_cursor = Some(offset.min(text.chars().count()));
        if !self.surface.defers_layout() {
            self.restore_cursor();
        }
    }

    fn restore_cursor(&mut self) {
        let Some(offset) = self.pending_cursor.take() else {
            return;
        };
        self.surface.set_cursor_offset(offset);
        if self.status.current() == Some(StatusSignal::Reloading) {
            self.status.arm(self.config.reload_clear());
        }
    }

    async fn save(&mut self) {
        if self.suspended {
            debug!("Access suspended, not saving");
            return;
        }
        let Some(flight) = self.guard.try_begin(FlightKind::Save) else {
            return;
        };
        let result = self.save_inner().await;
        self.guard.finish(flight);

        match result {
            Ok(Some(stat)) => {
                info!(size = stat.size, "Saved");
                self.status.show(StatusSignal::Saved, &self.events);
                self.events.emit(SessionEvent::Saved { size: stat.size });
            }
            Ok(None) => debug!("Nothing to save"),
            Err(err) => self.fail(err),
        }
    }

    async fn save_inner(&mut self) -> Result<Option<FileStat>> {
        let serialized = self.surface.text();
        let Some(normalized) = autosave::prepare(
            &serialized,
            self.surface.is_blank(),
            self.reconciler.baseline(),
        )?
        else {
            return Ok(None);
        };

        let handle = Arc::clone(&self.handle);
        let stat = race(&self.cancel, async {
            autosave::write_back(handle.as_ref(), &normalized).await
        })
        .await?;

        self.reconciler.advance(normalized, stat.stamp);
        Ok(Some(stat))
    }

    async fn regrant(&mut self) {
        let handle = Arc::clone(&self.handle);
        let permission = race(&self.cancel, async {
            handle
                .request_permission(AccessMode::ReadWrite)
                .await
                .map_err(SyncError::read)
        })
        .await;

        match permission {
            Ok(Permission::Granted) => {
                if self.suspended {
                    info!("Access re-granted, resuming");
                }
                self.suspended = false;
                // Persist anything edited while suspended.
                self.autosave.on_edit(false);
            }
            Ok(Permission::Denied) => self.fail(SyncError::PermissionDenied(
                "re-grant was declined".into(),
            )),
            Err(err) => self.fail(err),
        }
    }

    /// Contain a failed pass: log it, publish it, keep running.
    fn fail(&mut self, err: SyncError) {
        match &err {
            SyncError::Cancelled => {
                debug!("Operation cancelled");
                return;
            }
            SyncError::PermissionDenied(_) => {
                warn!(error = %err, "Access lost, suspending until re-granted");
                self.suspended = true;
                self.poller.cancel();
            }
            SyncError::SerializationFault(_) => {
                error!(error = %err, "Refusing to write unusable content");
            }
            SyncError::Read(_) | SyncError::Write(_) => {
                warn!(error = %err, "Sync pass failed, will retry");
            }
        }
        self.events.emit(SessionEvent::Failed {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn teardown(&mut self) {
        self.poller.cancel();
        self.autosave.cancel();
        self.status.cancel();
        self.pending_cursor = None;
        info!("Session closed");
    }
}

/// Await `fut` unless the session is cancelled first.
async fn race<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = fut => result,
    }
}

/// Handle to a spawned session.
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Deliver an input. Returns false if the session has ended.
    pub fn send(&self, input: SessionInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<SessionInput> {
        self.inputs.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the session and wait for its task to end.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            error!(error = %err, "Session task failed");
        }
    }
}
