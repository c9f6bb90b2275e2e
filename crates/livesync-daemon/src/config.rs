//! Daemon configuration: session settings layered from defaults, an optional
//! JSON file and command-line overrides.

use livesync_core::SessionConfig;
use std::path::{Path, PathBuf};

/// Environment variable overriding where the daemon keeps its data.
pub const DATA_DIR_ENV: &str = "LIVESYNC_DATA_DIR";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No data directory available; set {DATA_DIR_ENV}")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

/// Load session settings. Missing keys in the file keep their defaults.
pub fn load_session_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let path = expand_tilde(&path.to_string_lossy());

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub poll_interval_ms: Option<u64>,
    pub autosave_ms: Option<u64>,
    pub no_autosave: bool,
}

impl CliOverrides {
    pub fn apply(&self, config: &mut SessionConfig) {
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.autosave_ms {
            config.autosave_ms = ms;
        }
        if self.no_autosave {
            config.autosave = false;
        }
    }
}

/// Where recent files are stored: `$LIVESYNC_DATA_DIR`, else
/// `<platform data dir>/livesync`.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(expand_tilde(&dir));
        }
    }

    dirs::data_dir()
        .map(|dir| dir.join("livesync"))
        .ok_or(ConfigError::NoDataDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_tilde("~"), home);
        assert_eq!(expand_tilde("~/notes/a.md"), home.join("notes/a.md"));
        assert_eq!(expand_tilde("/tmp/a.md"), PathBuf::from("/tmp/a.md"));
        assert_eq!(expand_tilde("~other/a.md"), PathBuf::from("~other/a.md"));
    }

    #[test]
    fn test_no_file_gives_defaults() {
        assert_eq!(load_session_config(None).unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("livesync.json");
        std::fs::write(
            &path,
            r#"{ "poll_interval_ms": 500, "patch": { "match_threshold": 0.3 } }"#,
        )
        .unwrap();

        let config = load_session_config(Some(&path)).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.autosave_ms, 2000);
        assert_eq!(config.patch.match_threshold, 0.3);
        assert_eq!(config.patch.margin, 4);
    }

    #[test]
    fn test_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_session_config(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            load_session_config(Some(&broken)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = SessionConfig::default();
        CliOverrides {
            poll_interval_ms: Some(250),
            autosave_ms: None,
            no_autosave: true,
        }
        .apply(&mut config);

        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.autosave_ms, 2000);
        assert!(!config.autosave);
    }
}
