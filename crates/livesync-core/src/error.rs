//! Session-level errors.

use crate::handle::HandleError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Access to the file was declined or revoked. Polling and saving stay
    /// suspended until the host re-grants it.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Read failed: {0}")]
    Read(HandleError),

    #[error("Write failed: {0}")]
    Write(HandleError),

    /// The serialized buffer is unusable; writing it would lose content.
    #[error("Serialization fault: {0}")]
    SerializationFault(String),

    /// The session was shut down while the operation was in flight.
    #[error("Cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Discriminant of [`SyncError`], for event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    PermissionDenied,
    Read,
    Write,
    SerializationFault,
    Cancelled,
}

impl SyncError {
    /// Classify a failure that happened while reading or polling.
    pub fn read(err: HandleError) -> Self {
        match err {
            HandleError::PermissionDenied(name) => SyncError::PermissionDenied(name),
            other => SyncError::Read(other),
        }
    }

    /// Classify a failure that happened while writing.
    pub fn write(err: HandleError) -> Self {
        match err {
            HandleError::PermissionDenied(name) => SyncError::PermissionDenied(name),
            other => SyncError::Write(other),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            SyncError::Read(_) => ErrorKind::Read,
            SyncError::Write(_) => ErrorKind::Write,
            SyncError::SerializationFault(_) => ErrorKind::SerializationFault,
            SyncError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
