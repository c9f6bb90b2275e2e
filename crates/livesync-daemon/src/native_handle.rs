//! Native file capability using tokio::fs.
//!
//! Reads are stable (the file is stat'ed before and after, and re-read if it
//! changed underneath) and writes are atomic (temp file in the same
//! directory, synced, then renamed over the target).

use async_trait::async_trait;
use livesync_core::handle::{
    AccessMode, ExternalSnapshot, FileHandle, FileStat, HandleError, ModificationStamp,
    Permission, Result, WriteStream,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const STABLE_READ_RETRIES: usize = 3;
const STABLE_READ_RETRY_SLEEP: Duration = Duration::from_millis(5);

/// Handle to one file on the local filesystem.
pub struct NativeHandle {
    path: PathBuf,
    name: String,
}

impl NativeHandle {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, err: io::Error) -> HandleError {
        map_io_error(&self.path, err)
    }

    async fn metadata(&self) -> Result<FileStat> {
        let metadata = fs::metadata(&self.path).await.map_err(|e| self.error(e))?;
        Ok(FileStat {
            stamp: stamp_of(&metadata),
            size: metadata.len(),
            name: self.name.clone(),
        })
    }
}

fn map_io_error(path: &Path, err: io::Error) -> HandleError {
    let path = path.display().to_string();
    match err.kind() {
        io::ErrorKind::PermissionDenied => HandleError::PermissionDenied(path),
        io::ErrorKind::NotFound => HandleError::NotFound(path),
        io::ErrorKind::InvalidData => HandleError::InvalidData(format!("{path}: {err}")),
        _ => HandleError::Io(format!("{path}: {err}")),
    }
}

/// Modification time in milliseconds since epoch.
fn stamp_of(metadata: &std::fs::Metadata) -> ModificationStamp {
    let millis = metadata
        .modified()
        .map(|t| {
            t.duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        })
        .unwrap_or(0);
    ModificationStamp(millis)
}

#[async_trait]
impl FileHandle for NativeHandle {
    async fn request_permission(&self, mode: AccessMode) -> Result<Permission> {
        match fs::File::open(&self.path).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                return Ok(Permission::Denied);
            }
            Err(e) => return Err(self.error(e)),
        }

        if mode == AccessMode::ReadWrite {
            let metadata = fs::metadata(&self.path).await.map_err(|e| self.error(e))?;
            if metadata.permissions().readonly() {
                debug!(path = %self.path.display(), "File is read-only");
                return Ok(Permission::Denied);
            }
        }

        Ok(Permission::Granted)
    }

    async fn stat(&self) -> Result<FileStat> {
        self.metadata().await
    }

    async fn read(&self) -> Result<ExternalSnapshot> {
        let mut last_err = None;
        for _ in 0..STABLE_READ_RETRIES {
            let before = self.metadata().await?;

            let bytes = match fs::read(&self.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    last_err = Some(self.error(e));
                    tokio::time::sleep(STABLE_READ_RETRY_SLEEP).await;
                    continue;
                }
            };

            let after = self.metadata().await?;
            if before != after {
                debug!(path = %self.path.display(), "File changed while reading, retrying");
                tokio::time::sleep(STABLE_READ_RETRY_SLEEP).await;
                continue;
            }

            let text = String::from_utf8(bytes).map_err(|e| {
                HandleError::InvalidData(format!("{}: {}", self.path.display(), e))
            })?;
            return Ok(ExternalSnapshot {
                text,
                stamp: after.stamp,
                size: after.size,
                name: after.name,
            });
        }

        Err(last_err.unwrap_or_else(|| {
            HandleError::Io(format!("{}: file changed while reading", self.path.display()))
        }))
    }

    async fn open_writer(&self) -> Result<Box<dyn WriteStream>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let pid = u128::from(std::process::id());

        for attempt in 0..10u128 {
            let suffix = pid ^ nanos ^ attempt;
            let tmp_path = dir.join(format!(".livesync-tmp-{}-{suffix}", self.name));
            let open = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)
                .await;
            match open {
                Ok(file) => {
                    return Ok(Box::new(NativeWriter {
                        file: Some(file),
                        tmp_path,
                        target: self.path.clone(),
                        name: self.name.clone(),
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(map_io_error(&tmp_path, e)),
            }
        }

        Err(HandleError::Io(format!(
            "{}: failed to create a temporary file",
            self.path.display()
        )))
    }
}

/// Writes into a temp file; `close` renames it over the target.
struct NativeWriter {
    /// `None` once closed or aborted.
    file: Option<fs::File>,
    tmp_path: PathBuf,
    target: PathBuf,
    name: String,
}

impl NativeWriter {
    async fn commit(&mut self, mut file: fs::File) -> Result<FileStat> {
        file.flush()
            .await
            .map_err(|e| map_io_error(&self.tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| map_io_error(&self.tmp_path, e))?;
        drop(file);

        fs::rename(&self.tmp_path, &self.target)
            .await
            .map_err(|e| map_io_error(&self.target, e))?;

        let metadata = fs::metadata(&self.target)
            .await
            .map_err(|e| map_io_error(&self.target, e))?;
        Ok(FileStat {
            stamp: stamp_of(&metadata),
            size: metadata.len(),
            name: self.name.clone(),
        })
    }
}

#[async_trait]
impl WriteStream for NativeWriter {
    async fn write(&mut self, text: &str) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| HandleError::Io("write stream already closed".into()))?;
        file.write_all(text.as_bytes())
            .await
            .map_err(|e| map_io_error(&self.tmp_path, e))
    }

    async fn close(&mut self) -> Result<FileStat> {
        let file = self
            .file
            .take()
            .ok_or_else(|| HandleError::Io("write stream already closed".into()))?;
        let result = self.commit(file).await;
        if result.is_err() {
            let _ = fs::remove_file(&self.tmp_path).await;
        }
        result
    }

    async fn abort(&mut self) {
        if self.file.take().is_some() {
            if let Err(e) = fs::remove_file(&self.tmp_path).await {
                warn!(path = %self.tmp_path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
}

impl Drop for NativeWriter {
    fn drop(&mut self) {
        // Dropped mid-write (e.g. the session was cancelled).
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}
