// Browser configuration, loaded from YAML with safe defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Feed simulation interval (the 8-12 s live update cadence)
    pub tick_interval_secs: u64,
    /// Per-second counter interval
    pub counter_interval_secs: u64,
    /// Pending bulk actions resolve as timed out after this long
    pub action_timeout_ms: i64,
    /// Override for the kv storage location; defaults to the platform
    /// data directory
    pub data_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 10,
            counter_interval_secs: 1,
            action_timeout_ms: 30_000,
            data_dir: None,
        }
    }
}

impl BrowserConfig {
    /// Read a YAML config file. A missing file is normal; a malformed
    /// one is reported and ignored. Both fall back to defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(?path, "no config file, using defaults");
                return Self::default();
            }
        };
        match serde_yaml::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(?path, ?err, "malformed config, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_defaults() {
        let temp = TempDir::new().unwrap();
        let config = BrowserConfig::load(&temp.path().join("absent.yaml"));
        assert_eq!(config, BrowserConfig::default());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("callgrid.yaml");
        std::fs::write(&path, "tick_interval_secs: 8\n").unwrap();

        let config = BrowserConfig::load(&path);
        assert_eq!(config.tick_interval_secs, 8);
        assert_eq!(config.action_timeout_ms, 30_000);
    }

    #[test]
    fn test_malformed_file_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("callgrid.yaml");
        std::fs::write(&path, "tick_interval_secs: [not a number\n").unwrap();

        let config = BrowserConfig::load(&path);
        assert_eq!(config, BrowserConfig::default());
    }
}
