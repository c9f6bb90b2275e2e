//! livesync-core: keeps an editable text buffer in step with a file that
//! other programs may change at any time.
//!
//! This crate provides:
//! - A session event loop polling the file, merging external changes into
//!   unsaved local edits, and autosaving on quiescence
//! - A context-anchored patch engine for three-way merging
//! - Markdown escape cleanup applied before every write
//! - FileHandle and EditingSurface trait abstractions

pub mod autosave;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod guard;
pub mod handle;
pub mod normalize;
pub mod patch;
pub mod poller;
pub mod recent;
pub mod reconcile;
pub mod session;
pub mod status;
pub mod surface;

pub use config::SessionConfig;
pub use error::{ErrorKind, SyncError};
pub use events::{EventBus, SessionEvent, StatusSignal, Subscription};
pub use handle::{
    AccessMode, ExternalSnapshot, FileHandle, FileStat, HandleError, InMemoryHandle,
    ModificationStamp, Permission, WriteStream,
};
pub use normalize::normalize;
pub use patch::{Patch, PatchConfig};
pub use recent::{RecentFile, RecentFiles, RecentList, format_file_size};
pub use reconcile::{Outcome, Reconciler};
pub use session::{Session, SessionHandle};
pub use surface::{EditingSurface, MemorySurface, SessionInput};
