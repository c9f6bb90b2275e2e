//! End-to-end tests for livesync-daemon.
//!
//! Runs real sessions against files in a temp directory: external edits,
//! autosave through the native handle, and the mirror watcher.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use livesync_core::{
    EditingSurface, EventBus, MemorySurface, RecentFiles, Session, SessionConfig, SessionEvent,
    SessionInput,
};
use livesync_daemon::config::{CliOverrides, load_session_config};
use livesync_daemon::mirror::{MirrorSurface, mirror_path};
use livesync_daemon::native_handle::NativeHandle;
use livesync_daemon::recent_store::RecentStore;
use livesync_daemon::watcher::{FileWatcher, MirrorEvent};
use livesync_core::recent::RecentFile;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval_ms: 20,
        poll_debounce_ms: 10,
        autosave_ms: 50,
        keystroke_window_ms: 50,
        status_clear_ms: 50,
        reload_clear_ms: 20,
        ..SessionConfig::default()
    }
}

/// Poll `check` until it holds or the wait runs out.
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(WAIT, async {
        loop {
            if check().await {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[tokio::test]
async fn test_external_edit_is_reloaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.md");
    std::fs::write(&path, "first draft\n").unwrap();

    let surface = MemorySurface::new();
    let session = Session::open(
        Arc::new(NativeHandle::new(path.clone())),
        Arc::new(surface.clone()),
        fast_config(),
        Arc::new(EventBus::new()),
    )
    .await
    .unwrap();
    assert_eq!(surface.text(), "first draft\n");
    let session = session.spawn();

    // Let the modification time move on.
    sleep(Duration::from_millis(50)).await;
    std::fs::write(&path, "second draft\n").unwrap();

    let reloaded = eventually(|| {
        let surface = surface.clone();
        async move { surface.text() == "second draft\n" }
    })
    .await;
    assert!(reloaded, "surface never picked up the external edit");

    session.shutdown().await;
}

#[tokio::test]
async fn test_local_edit_is_autosaved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.md");
    std::fs::write(&path, "before\n").unwrap();

    let events = Arc::new(EventBus::new());
    let saved = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = saved.clone();
    let _subscription = events.subscribe(move |event| {
        if let SessionEvent::Saved { size } = event {
            sink.lock().unwrap().push(size);
        }
    });

    let surface = MemorySurface::new();
    let session = Session::open(
        Arc::new(NativeHandle::new(path.clone())),
        Arc::new(surface.clone()),
        fast_config(),
        events,
    )
    .await
    .unwrap()
    .spawn();

    surface.type_text("after\n");
    session.send(SessionInput::Edited);

    let path_clone = path.clone();
    let written = eventually(move || {
        let path = path_clone.clone();
        async move { read(&path) == "after\n" }
    })
    .await;
    assert!(written, "edit was never saved");
    assert_eq!(saved.lock().unwrap().first(), Some(&6));

    session.shutdown().await;

    // Only the target remains: no temp files left behind.
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["note.md"]);
}

#[tokio::test]
async fn test_mirror_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("todo.md");
    std::fs::write(&path, "- milk\n").unwrap();

    let mirror = Arc::new(MirrorSurface::new(mirror_path(&path).unwrap()));
    let session = Session::open(
        Arc::new(NativeHandle::new(path.clone())),
        mirror.clone(),
        fast_config(),
        Arc::new(EventBus::new()),
    )
    .await
    .unwrap()
    .spawn();

    // Opening fills the mirror.
    assert_eq!(read(mirror.path()), "- milk\n");

    // A user edit to the mirror flows back to the file.
    std::fs::write(mirror.path(), "- milk\n- eggs\n").unwrap();
    assert!(mirror.absorb_from_disk().await.unwrap());
    session.send(SessionInput::Edited);

    let file = path.clone();
    let saved = eventually(move || {
        let file = file.clone();
        async move { read(&file) == "- milk\n- eggs\n" }
    })
    .await;
    assert!(saved, "mirror edit was never saved to the file");

    // An external edit to the file flows into the mirror.
    sleep(Duration::from_millis(50)).await;
    std::fs::write(&path, "- bread\n").unwrap();

    let mirror_path = mirror.path().to_path_buf();
    let reloaded = eventually(move || {
        let mirror_path = mirror_path.clone();
        async move { read(&mirror_path) == "- bread\n" }
    })
    .await;
    assert!(reloaded, "external edit never reached the mirror");

    session.shutdown().await;
}

#[tokio::test]
async fn test_unannounced_mirror_edit_survives_external_change() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.md");
    std::fs::write(&path, "line one\nline two\n").unwrap();

    let mirror = Arc::new(MirrorSurface::new(mirror_path(&path).unwrap()));
    let session = Session::open(
        Arc::new(NativeHandle::new(path.clone())),
        mirror.clone(),
        fast_config(),
        Arc::new(EventBus::new()),
    )
    .await
    .unwrap()
    .spawn();
    sleep(Duration::from_millis(50)).await;

    // The user saves the mirror, and before any watcher reports it the file
    // changes elsewhere too.
    std::fs::write(mirror.path(), "USER EDIT line one\nline two\n").unwrap();
    std::fs::write(&path, "line one\nline two\nexternal three\n").unwrap();

    let merged = "USER EDIT line one\nline two\nexternal three\n";
    let mirror_file = mirror.path().to_path_buf();
    let in_mirror = eventually(move || {
        let mirror_file = mirror_file.clone();
        async move { read(&mirror_file) == merged }
    })
    .await;
    assert!(in_mirror, "mirror holds {:?}", read(mirror.path()));

    let file = path.clone();
    let in_file = eventually(move || {
        let file = file.clone();
        async move { read(&file) == merged }
    })
    .await;
    assert!(in_file, "file holds {:?}", read(&path));

    session.shutdown().await;
}

#[tokio::test]
async fn test_mirror_events_after_session_end_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.md");
    std::fs::write(&path, "text\n").unwrap();

    let mirror = Arc::new(MirrorSurface::new(mirror_path(&path).unwrap()));
    let session = Session::open(
        Arc::new(NativeHandle::new(path.clone())),
        mirror.clone(),
        fast_config(),
        Arc::new(EventBus::new()),
    )
    .await
    .unwrap()
    .spawn();

    // Unchanged content is not an edit, and is always accepted.
    assert!(mirror.handle_event(MirrorEvent::Modified, &session).await);

    std::fs::write(mirror.path(), "edited\n").unwrap();
    assert!(mirror.handle_event(MirrorEvent::Modified, &session).await);

    session.cancellation_token().cancel();
    let ended = eventually(|| {
        let finished = session.is_finished();
        async move { finished }
    })
    .await;
    assert!(ended, "session never stopped");

    std::fs::write(mirror.path(), "edited again\n").unwrap();
    assert!(!mirror.handle_event(MirrorEvent::Modified, &session).await);

    // A deleted mirror is put back from what the session last saw.
    std::fs::remove_file(mirror.path()).unwrap();
    assert!(mirror.handle_event(MirrorEvent::Deleted, &session).await);
    assert_eq!(read(mirror.path()), "edited again\n");
}

#[tokio::test]
async fn test_watcher_reports_mirror_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("note.livesync.md");
    let other = dir.path().join("unrelated.md");
    std::fs::write(&path, "v1").unwrap();

    let mut watcher = FileWatcher::new(&path, Duration::from_millis(50)).unwrap();
    // Give the backend a moment to register the watch.
    sleep(Duration::from_millis(100)).await;

    std::fs::write(&other, "noise").unwrap();
    std::fs::write(&path, "v2").unwrap();

    let event = timeout(WAIT, watcher.event_rx().recv())
        .await
        .expect("no event for the mirror")
        .unwrap();
    assert_eq!(event, MirrorEvent::Modified);

    std::fs::remove_file(&path).unwrap();
    let event = timeout(WAIT, watcher.event_rx().recv())
        .await
        .expect("no event for the deletion")
        .unwrap();
    assert_eq!(event, MirrorEvent::Deleted);
}

#[tokio::test]
async fn test_open_is_recorded_in_recent_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal.md");
    std::fs::write(&path, "x".repeat(1536)).unwrap();

    let handle = NativeHandle::new(path);
    let stat = livesync_core::FileHandle::stat(&handle).await.unwrap();

    let data_dir = dir.path().join("data");
    let mut store = RecentStore::open(&data_dir);
    store.put(RecentFile::from_stat(&stat, 42)).unwrap();

    let files = RecentStore::open(&data_dir).list();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, "journal.md");
    assert_eq!(livesync_core::format_file_size(files[0].size), "1.5 KB");
}

#[test]
fn test_config_file_then_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("livesync.json");
    std::fs::write(&path, r#"{ "autosave_ms": 5000, "poll_interval_ms": 800 }"#).unwrap();

    let mut config = load_session_config(Some(&path)).unwrap();
    CliOverrides {
        poll_interval_ms: Some(100),
        ..CliOverrides::default()
    }
    .apply(&mut config);

    assert_eq!(config.autosave_ms, 5000);
    assert_eq!(config.poll_interval_ms, 100);
    assert!(config.autosave);
}
