//! livesync-daemon library: the native pieces behind the `livesync` binary,
//! exposed so integration tests can drive them.

pub mod config;
pub mod mirror;
pub mod native_handle;
pub mod recent_store;
pub mod watcher;

pub use config::{CliOverrides, ConfigError, expand_tilde, load_session_config};
pub use mirror::{MirrorSurface, mirror_path};
pub use native_handle::NativeHandle;
pub use recent_store::RecentStore;
pub use watcher::{FileWatcher, MirrorEvent};
