//! Path resolution for condosync configuration and data files.
//!
//! All condosync data is stored in `~/.condosync/` unless `CONDOSYNC_HOME`
//! points somewhere else:
//! - `config.yaml` - Main configuration file
//! - `condosync.db` - SQLite database holding the offline queue

use std::path::PathBuf;

use crate::error::SyncError;

/// Environment variable that overrides the data directory.
pub const HOME_ENV: &str = "CONDOSYNC_HOME";

/// Paths to condosync configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.condosync/`
    pub root: PathBuf,
    /// Config file: `~/.condosync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.condosync/condosync.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `CONDOSYNC_HOME`, falling back to the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set.
    pub fn new() -> Result<Self, SyncError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::with_root(PathBuf::from(root)));
            }
        }

        let home = std::env::var("HOME")
            .map_err(|_| SyncError::Config("Could not determine home directory".to_string()))?;

        Ok(Self::with_root(PathBuf::from(home).join(".condosync")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("condosync.db"),
            root,
        }
    }

    /// Ensure the data directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), SyncError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                SyncError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}
