//! Configuration settings for condosync.
//!
//! Settings are loaded from `config.yaml` in the data directory.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Paths;
use crate::error::SyncError;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote backend settings.
    pub remote: RemoteConfig,
    /// Queue replay settings.
    pub sync: SyncConfig,
}

/// Remote backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Anonymous or service API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Timeout for a single HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Queue replay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on one replayed remote call before the pass aborts.
    #[serde(default = "default_replay_timeout")]
    pub replay_timeout_secs: u64,
    /// How often the HTTP connectivity probe checks the backend.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    /// Move unprocessable entries to the dead-letter list instead of
    /// leaving them in the queue.
    #[serde(default = "default_true")]
    pub dead_letter_unknown: bool,
}

const fn default_request_timeout() -> u64 {
    15
}

const fn default_replay_timeout() -> u64 {
    30
}

const fn default_probe_interval() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replay_timeout_secs: default_replay_timeout(),
            probe_interval_secs: default_probe_interval(),
            dead_letter_unknown: default_true(),
        }
    }
}

impl SyncConfig {
    /// Replay timeout as a `Duration`.
    #[must_use]
    pub const fn replay_timeout(&self) -> Duration {
        Duration::from_secs(self.replay_timeout_secs)
    }

    /// Probe interval as a `Duration`.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, SyncError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.remote.base_url.is_none());
        assert_eq!(config.remote.request_timeout_secs, 15);
        assert_eq!(config.sync.replay_timeout(), Duration::from_secs(30));
        assert_eq!(config.sync.probe_interval(), Duration::from_secs(10));
        assert!(config.sync.dead_letter_unknown);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let config = Config::load_from_path(&config_path).unwrap();

        assert_eq!(config.sync.replay_timeout_secs, 30);
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml = r"
remote:
  base_url: https://condo.example.com
  api_key: anon-key
sync:
  replay_timeout_secs: 5
";
        std::fs::write(&config_path, yaml).unwrap();

        let loaded = Config::load_from_path(&config_path).unwrap();

        assert_eq!(
            loaded.remote.base_url.as_deref(),
            Some("https://condo.example.com")
        );
        assert_eq!(loaded.remote.api_key.as_deref(), Some("anon-key"));
        assert_eq!(loaded.sync.replay_timeout_secs, 5);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let partial_yaml = r"
sync:
  dead_letter_unknown: false
";
        std::fs::write(&config_path, partial_yaml).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();

        assert!(!config.sync.dead_letter_unknown);
        assert_eq!(config.sync.probe_interval_secs, 10);
        assert_eq!(config.remote.request_timeout_secs, 15);
    }

    #[test]
    fn test_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "sync: [not, a, map]").unwrap();

        let err = Config::load_from_path(&config_path).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
