//! File capability abstraction for the externally-modifiable document.
//!
//! A `FileHandle` references exactly one file and must be granted permission
//! before it is read or written. Implementations:
//! - `InMemoryHandle` - For testing
//! - `NativeHandle` (in livesync-daemon) - Uses tokio::fs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, HandleError>;

/// Opaque modification marker. Only ever compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModificationStamp(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// File metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub stamp: ModificationStamp,
    /// File size in bytes
    pub size: u64,
    /// File name (not full path)
    pub name: String,
}

/// The file's content as read during one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSnapshot {
    pub text: String,
    pub stamp: ModificationStamp,
    pub size: u64,
    pub name: String,
}

/// Capability referencing one external file.
#[async_trait]
pub trait FileHandle: Send + Sync {
    /// Ask for access. Must be granted before the first read or write.
    async fn request_permission(&self, mode: AccessMode) -> Result<Permission>;

    /// Current metadata, without reading content.
    async fn stat(&self) -> Result<FileStat>;

    /// Read the whole file as text.
    async fn read(&self) -> Result<ExternalSnapshot>;

    /// Open a stream that replaces the file's content when closed.
    async fn open_writer(&self) -> Result<Box<dyn WriteStream>>;
}

/// A pending replacement of the file's content.
///
/// Nothing is visible to readers until `close` succeeds. Exactly one of
/// `close` or `abort` should be called; the stream is unusable afterwards.
#[async_trait]
pub trait WriteStream: Send {
    async fn write(&mut self, text: &str) -> Result<()>;

    /// Commit the written content and return the file's new metadata.
    async fn close(&mut self) -> Result<FileStat>;

    /// Discard everything written so far.
    async fn abort(&mut self);
}

/// Replace the file's content with `text`, closing the stream on success and
/// aborting it on any write error.
pub async fn write_all(handle: &dyn FileHandle, text: &str) -> Result<FileStat> {
    let mut stream = handle.open_writer().await?;
    if let Err(err) = stream.write(text).await {
        stream.abort().await;
        return Err(err);
    }
    match stream.close().await {
        Ok(stat) => Ok(stat),
        Err(err) => {
            stream.abort().await;
            Err(err)
        }
    }
}

/// In-memory file handle for testing.
///
/// Clones share the same underlying file, so a test can keep one clone to
/// play the external writer while the session owns another.
#[derive(Clone)]
pub struct InMemoryHandle {
    file: Arc<Mutex<MemoryFile>>,
}

struct MemoryFile {
    name: String,
    text: String,
    /// Bumped on every committed write; doubles as the modification stamp.
    version: u64,
    denied: bool,
    fail_reads: bool,
    fail_writes: bool,
    reads: usize,
    writes: usize,
}

impl MemoryFile {
    fn stat(&self) -> FileStat {
        FileStat {
            stamp: ModificationStamp(self.version),
            size: self.text.len() as u64,
            name: self.name.clone(),
        }
    }

    fn check_access(&self) -> Result<()> {
        if self.denied {
            return Err(HandleError::PermissionDenied(self.name.clone()));
        }
        Ok(())
    }
}

impl InMemoryHandle {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file: Arc::new(Mutex::new(MemoryFile {
                name: name.into(),
                text: text.into(),
                version: 1,
                denied: false,
                fail_reads: false,
                fail_writes: false,
                reads: 0,
                writes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFile> {
        self.file.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate another program saving the file.
    pub fn write_external(&self, text: impl Into<String>) {
        let mut file = self.lock();
        file.text = text.into();
        file.version += 1;
    }

    /// Change the stamp without changing content (e.g. `touch`).
    pub fn touch(&self) {
        self.lock().version += 1;
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Revoke (or restore) access. While denied, permission requests are
    /// refused and every operation fails with `PermissionDenied`.
    pub fn set_denied(&self, denied: bool) {
        self.lock().denied = denied;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful content reads.
    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Number of committed writes (external writes are not counted).
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

#[async_trait]
impl FileHandle for InMemoryHandle {
    async fn request_permission(&self, _mode: AccessMode) -> Result<Permission> {
        let file = self.lock();
        Ok(if file.denied {
            Permission::Denied
        } else {
            Permission::Granted
        })
    }

    async fn stat(&self) -> Result<FileStat> {
        let file = self.lock();
        file.check_access()?;
        Ok(file.stat())
    }

    async fn read(&self) -> Result<ExternalSnapshot> {
        let mut file = self.lock();
        file.check_access()?;
        if file.fail_reads {
            return Err(HandleError::Io(format!("simulated read failure: {}", file.name)));
        }
        file.reads += 1;
        let stat = file.stat();
        Ok(ExternalSnapshot {
            text: file.text.clone(),
            stamp: stat.stamp,
            size: stat.size,
            name: stat.name,
        })
    }

    async fn open_writer(&self) -> Result<Box<dyn WriteStream>> {
        self.lock().check_access()?;
        Ok(Box::new(MemoryWriter {
            file: Arc::clone(&self.file),
            buffer: String::new(),
        }))
    }
}

struct MemoryWriter {
    file: Arc<Mutex<MemoryFile>>,
    buffer: String,
}

#[async_trait]
impl WriteStream for MemoryWriter {
    async fn write(&mut self, text: &str) -> Result<()> {
        let file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if file.fail_writes {
            return Err(HandleError::Io(format!("simulated write failure: {}", file.name)));
        }
        self.buffer.push_str(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<FileStat> {
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.check_access()?;
        file.text = std::mem::take(&mut self.buffer);
        file.version += 1;
        file.writes += 1;
        Ok(file.stat())
    }

    async fn abort(&mut self) {
        self.buffer.clear();
    }
}
