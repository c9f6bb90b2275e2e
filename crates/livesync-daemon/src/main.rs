//! livesync: keep a file and a working copy of it in step.
//!
//! The file is edited through a mirror next to it; external changes to the
//! file are reloaded or merged into the mirror, and edits to the mirror are
//! autosaved back.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use livesync_daemon::config::{self, CliOverrides};
use livesync_daemon::mirror::{MirrorSurface, mirror_path};
use livesync_daemon::native_handle::NativeHandle;
use livesync_daemon::recent_store::{RecentStore, format_last_opened};
use livesync_daemon::watcher::FileWatcher;

use livesync_core::handle::FileHandle;
use livesync_core::recent::{RecentFile, RecentFiles, format_file_size};
use livesync_core::{EventBus, Session, SessionEvent};

const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "livesync")]
#[command(about = "Live two-way sync between a file and its working copy")]
struct Args {
    /// File to open
    #[arg(required_unless_present_any = ["recent", "forget", "clear_recent"])]
    file: Option<String>,

    /// Working copy to edit (default: <stem>.livesync.<ext> next to the file)
    #[arg(short, long)]
    mirror: Option<String>,

    /// JSON file with session settings
    #[arg(short, long)]
    config: Option<String>,

    /// How often to check the file for changes, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Quiet period before autosaving, in milliseconds
    #[arg(long)]
    autosave_ms: Option<u64>,

    /// Disable autosave; edits stay in the working copy
    #[arg(long)]
    no_autosave: bool,

    /// List recently opened files and exit
    #[arg(long)]
    recent: bool,

    /// Remove a file from the recent list and exit
    #[arg(long, value_name = "ID")]
    forget: Option<String>,

    /// Clear the recent list and exit
    #[arg(long)]
    clear_recent: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

/// Open recent-files storage. Failures are logged; the daemon runs without it.
fn open_recent_store() -> Option<RecentStore> {
    match config::data_dir() {
        Ok(dir) => Some(RecentStore::open(&dir)),
        Err(e) => {
            warn!("Recent files unavailable: {}", e);
            None
        }
    }
}

/// Handle `--recent`, `--forget` and `--clear-recent`.
fn run_recent_command(args: &Args) -> Result<()> {
    let data_dir = config::data_dir()?;
    let mut store = RecentStore::open(&data_dir);

    if let Some(id) = &args.forget {
        store.remove(id)?;
        println!("Forgot {}", id);
    }
    if args.clear_recent {
        store.clear()?;
        println!("Cleared recent files");
    }
    if args.recent {
        let files = store.list();
        if files.is_empty() {
            println!("No recent files");
        }
        let now = chrono::Local::now();
        for file in files {
            println!(
                "{:<40} {:>10}  {}",
                file.name,
                format_file_size(file.size),
                format_last_opened(file.last_opened, &now)
            );
        }
    }
    Ok(())
}

async fn record_recent(handle: &NativeHandle) {
    let Some(mut store) = open_recent_store() else {
        return;
    };
    let stat = match handle.stat().await {
        Ok(stat) => stat,
        Err(e) => {
            warn!("Could not stat file for recent list: {}", e);
            return;
        }
    };
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64);

    if let Err(e) = store.put(RecentFile::from_stat(&stat, now_ms)) {
        warn!("Failed to update recent files: {}", e);
    }
}

fn log_event(event: SessionEvent) {
    match event {
        SessionEvent::StatusShown { signal } => debug!(?signal, "Status shown"),
        SessionEvent::StatusCleared { signal } => debug!(?signal, "Status cleared"),
        SessionEvent::Reconciled {
            reloaded: true, ..
        } => info!("Reloaded external changes"),
        SessionEvent::Reconciled {
            applied, skipped, ..
        } => info!(applied, skipped, "Merged external changes"),
        SessionEvent::Saved { size } => info!("Saved ({})", format_file_size(size)),
        SessionEvent::Failed { kind, message } => error!(?kind, "{}", message),
    }
}

/// Remove the mirror if the file holds everything it does; otherwise keep it
/// so no edits are lost.
async fn tidy_mirror(mirror: &MirrorSurface, handle: &NativeHandle) {
    let mirror_text = tokio::fs::read_to_string(mirror.path()).await.ok();
    let file_text = handle.read().await.ok().map(|snapshot| snapshot.text);

    match (mirror_text, file_text) {
        (Some(m), Some(f)) if m == f => {
            if let Err(e) = mirror.remove() {
                warn!("{:#}", e);
            }
        }
        (Some(_), _) => warn!("Keeping unsaved working copy {}", mirror.path().display()),
        (None, _) => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,livesync=debug,livesync_core=debug,livesync_daemon=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.recent || args.forget.is_some() || args.clear_recent {
        return run_recent_command(&args);
    }

    let file = config::expand_tilde(args.file.as_deref().context("no file given")?);
    let mut session_config = config::load_session_config(
        args.config.as_deref().map(PathBuf::from).as_deref(),
    )?;
    CliOverrides {
        poll_interval_ms: args.poll_interval_ms,
        autosave_ms: args.autosave_ms,
        no_autosave: args.no_autosave,
    }
    .apply(&mut session_config);

    let mirror_file = match &args.mirror {
        Some(path) => config::expand_tilde(path),
        None => mirror_path(&file)?,
    };

    info!("Starting livesync");
    info!("File: {:?}", file);
    info!("Working copy: {:?}", mirror_file);

    let handle = Arc::new(NativeHandle::new(file));
    let mirror = Arc::new(MirrorSurface::new(mirror_file));
    let events = Arc::new(EventBus::new());
    let _subscription = events.subscribe(log_event);

    let session = Session::open(handle.clone(), mirror.clone(), session_config, events)
        .await
        .context("failed to open file")?;
    record_recent(&handle).await;

    let mut watcher = FileWatcher::new(mirror.path(), WATCH_DEBOUNCE)?;
    info!("Watching {}", watcher.path().display());

    let session = session.spawn();
    info!("Running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            Some(event) = watcher.event_rx().recv() => {
                if !mirror.handle_event(event, &session).await {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }

        if session.is_finished() {
            warn!("Session ended");
            break;
        }
    }

    info!("Shutting down");
    drop(watcher);
    session.shutdown().await;
    tidy_mirror(&mirror, &handle).await;
    Ok(())
}
