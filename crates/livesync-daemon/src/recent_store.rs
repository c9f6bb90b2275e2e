//! JSON-file persistence for recently opened files.
//!
//! Stored as `recent.json` in the daemon's data directory.

use anyhow::Result;
use chrono::{DateTime, TimeZone};
use livesync_core::recent::{RecentFile, RecentFiles, RecentList};
use std::fs;
use std::path::{Path, PathBuf};

pub const RECENT_FILE_NAME: &str = "recent.json";

pub struct RecentStore {
    path: PathBuf,
    files: RecentList,
}

impl RecentStore {
    /// Open the store in `data_dir`, loading existing entries if present.
    ///
    /// A corrupt file is treated as empty and overwritten on the next change.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(RECENT_FILE_NAME);
        let mut store = Self {
            path,
            files: RecentList::new(),
        };

        match store.load() {
            Ok(files) => store.files = files,
            Err(e) => tracing::warn!("Ignoring unreadable recent files: {}", e),
        }

        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load entries from disk.
    pub fn load(&self) -> Result<RecentList> {
        if !self.path.exists() {
            return Ok(RecentList::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let files: RecentList = serde_json::from_str(&contents)?;
        Ok(files)
    }

    /// Save current entries to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&self.files)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// When a file was last opened, relative to `now`: a time today, a weekday
/// within the week, a date beyond that.
pub fn format_last_opened<Tz: TimeZone>(last_opened_ms: u64, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(opened) = i64::try_from(last_opened_ms)
        .ok()
        .and_then(DateTime::<chrono::Utc>::from_timestamp_millis)
    else {
        return "unknown".to_string();
    };
    let opened = opened.with_timezone(&now.timezone());
    let age = now.clone().signed_duration_since(&opened);

    if age < chrono::Duration::hours(24) {
        opened.format("%H:%M").to_string()
    } else if age < chrono::Duration::days(7) {
        opened.format("%a %H:%M").to_string()
    } else {
        opened.format("%b %-d, %Y").to_string()
    }
}

impl RecentFiles for RecentStore {
    type Error = anyhow::Error;

    fn put(&mut self, file: RecentFile) -> Result<()> {
        self.files.upsert(file);
        self.save()
    }

    fn list(&self) -> Vec<RecentFile> {
        self.files.files().to_vec()
    }

    fn remove(&mut self, id: &str) -> Result<()> {
        let before = self.files.files().len();
        let _ = RecentFiles::remove(&mut self.files, id);
        if self.files.files().len() == before {
            anyhow::bail!("no recent file with id {id:?}");
        }
        self.save()
    }

    fn clear(&mut self) -> Result<()> {
        let _ = RecentFiles::clear(&mut self.files);
        self.save()
    }
}
