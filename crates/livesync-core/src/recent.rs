//! Recently opened files.

use crate::handle::FileStat;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

/// Most entries kept in a recent-files list.
pub const MAX_RECENT_FILES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFile {
    /// The file name; reopening the same name replaces its entry.
    pub id: String,
    pub name: String,
    /// Size in bytes when last opened
    pub size: u64,
    /// Modification time in milliseconds since epoch
    pub last_modified: u64,
    /// When the file was last opened, in milliseconds since epoch
    pub last_opened: u64,
}

impl RecentFile {
    /// Entry for a file just opened. Native stamps are modification times,
    /// so the stamp doubles as `last_modified`.
    pub fn from_stat(stat: &FileStat, now_ms: u64) -> Self {
        Self {
            id: stat.name.clone(),
            name: stat.name.clone(),
            size: stat.size,
            last_modified: stat.stamp.0,
            last_opened: now_ms,
        }
    }
}

/// Storage for recent files. Listing is most recently opened first.
pub trait RecentFiles {
    type Error;

    fn put(&mut self, file: RecentFile) -> Result<(), Self::Error>;

    fn list(&self) -> Vec<RecentFile>;

    fn remove(&mut self, id: &str) -> Result<(), Self::Error>;

    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// Ordered, bounded list of recent files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentList {
    files: Vec<RecentFile>,
}

impl RecentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or refresh an entry, keeping the list ordered and bounded.
    pub fn upsert(&mut self, file: RecentFile) {
        self.files.retain(|f| f.id != file.id);
        self.files.push(file);
        self.files.sort_by(|a, b| b.last_opened.cmp(&a.last_opened));
        self.files.truncate(MAX_RECENT_FILES);
    }

    pub fn get(&self, id: &str) -> Option<&RecentFile> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn files(&self) -> &[RecentFile] {
        &self.files
    }
}

impl RecentFiles for RecentList {
    type Error = Infallible;

    fn put(&mut self, file: RecentFile) -> Result<(), Infallible> {
        self.upsert(file);
        Ok(())
    }

    fn list(&self) -> Vec<RecentFile> {
        self.files.clone()
    }

    fn remove(&mut self, id: &str) -> Result<(), Infallible> {
        self.files.retain(|f| f.id != id);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Infallible> {
        self.files.clear();
        Ok(())
    }
}

/// Human-readable byte count: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, opened: u64) -> RecentFile {
        RecentFile {
            id: id.into(),
            name: id.into(),
            size: 10,
            last_modified: 0,
            last_opened: opened,
        }
    }

    #[test]
    fn test_list_is_most_recent_first() {
        let mut list = RecentList::new();
        list.put(file("a.md", 1)).unwrap();
        list.put(file("b.md", 3)).unwrap();
        list.put(file("c.md", 2)).unwrap();

        let ids: Vec<_> = list.list().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["b.md", "c.md", "a.md"]);
    }

    #[test]
    fn test_reopening_replaces_entry() {
        let mut list = RecentList::new();
        list.put(file("a.md", 1)).unwrap();
        list.put(file("b.md", 2)).unwrap();
        list.put(file("a.md", 5)).unwrap();

        assert_eq!(list.files().len(), 2);
        assert_eq!(list.files()[0].id, "a.md");
        assert_eq!(list.get("a.md").unwrap().last_opened, 5);
    }

    #[test]
    fn test_bounded() {
        let mut list = RecentList::new();
        for i in 0..15 {
            list.put(file(&format!("{i}.md"), i)).unwrap();
        }
        assert_eq!(list.files().len(), MAX_RECENT_FILES);
        assert_eq!(list.files()[0].id, "14.md");
        assert!(list.get("4.md").is_none());
    }

    #[test]
    fn test_remove_and_clear() {
        let mut list = RecentList::new();
        list.put(file("a.md", 1)).unwrap();
        list.put(file("b.md", 2)).unwrap();
        list.remove("a.md").unwrap();
        assert!(list.get("a.md").is_none());
        list.clear().unwrap();
        assert!(list.list().is_empty());
    }

    #[test]
    fn test_from_stat_uses_name_as_id() {
        let stat = FileStat {
            stamp: crate::ModificationStamp(1_700_000_000_000),
            size: 42,
            name: "todo.md".into(),
        };
        let file = RecentFile::from_stat(&stat, 1_700_000_001_000);
        assert_eq!(file.id, "todo.md");
        assert_eq!(file.last_modified, 1_700_000_000_000);
        assert_eq!(file.last_opened, 1_700_000_001_000);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&file("a.md", 7)).unwrap();
        assert!(json.contains("\"lastOpened\":7"));
        assert!(json.contains("\"lastModified\":0"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_048_576), "1 MB");
        assert_eq!(format_file_size(1_234_567), "1.18 MB");
    }
}
