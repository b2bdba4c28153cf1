//! Configuration for the Rhizome fetch scheduler.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $RHIZOME_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/rhizome/config.toml
//!   3. ~/.config/rhizome/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One size-classed queue's static shape (§3 Q2, Invariant Q1/Q2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueShape {
    /// Queue accepts payloads strictly smaller than this many bytes.
    /// `None` means unbounded — the last queue in the list must be `None`.
    pub size_threshold: Option<u64>,
    /// Fixed candidate-array capacity for this queue.
    pub capacity: usize,
}

/// Top-level fetch-scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhizomeConfig {
    /// Queues, in ascending `size_threshold` order (enforced at load time).
    pub queues: Vec<QueueShape>,
    /// How often the fetch driver tick fires (§4.4).
    pub fetch_interval_ms: u64,
    /// Per-slot idle deadline (`RHIZOME_IDLE_TIMEOUT`, §4.6).
    pub idle_timeout_ms: u64,
    /// Where temporary payload/manifest files are written (§6).
    pub import_dir: PathBuf,
    /// Upper bound on a fetched-by-prefix manifest's size (§6).
    pub max_manifest_bytes: u64,
}

impl Default for RhizomeConfig {
    fn default() -> Self {
        Self {
            queues: vec![
                QueueShape { size_threshold: Some(10_000), capacity: 5 },
                QueueShape { size_threshold: Some(100_000), capacity: 4 },
                QueueShape { size_threshold: Some(1_000_000), capacity: 3 },
                QueueShape { size_threshold: Some(10_000_000), capacity: 2 },
                QueueShape { size_threshold: None, capacity: 1 },
            ],
            fetch_interval_ms: 5_000,
            idle_timeout_ms: 30_000,
            import_dir: data_dir().join("import"),
            max_manifest_bytes: 8192,
        }
    }
}

/// Default path for the SQLite-backed manifest/file store, for daemons
/// that don't override it via their own configuration.
pub fn data_dir_for_store() -> PathBuf {
    data_dir().join("rhizome.sqlite3")
}

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("rhizome")
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("rhizome")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("queues must be in strictly ascending size_threshold order with the last one unbounded")]
    BadQueueOrder,
}

impl RhizomeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            RhizomeConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("RHIZOME_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&RhizomeConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RHIZOME_FETCH_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.fetch_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("RHIZOME_IDLE_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.idle_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("RHIZOME_IMPORT_DIR") {
            self.import_dir = PathBuf::from(v);
        }
    }

    /// Enforce Invariant Q2's precondition: queues ascending, last unbounded.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut last: Option<u64> = Some(0);
        for (i, q) in self.queues.iter().enumerate() {
            let is_last = i + 1 == self.queues.len();
            match (q.size_threshold, is_last) {
                (None, true) => {}
                (Some(t), false) => match last {
                    Some(prev) if t > prev => last = Some(t),
                    _ => return Err(ConfigError::BadQueueOrder),
                },
                _ => return Err(ConfigError::BadQueueOrder),
            }
        }
        if self.queues.is_empty() {
            return Err(ConfigError::BadQueueOrder);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_five_ascending_queues() {
        let config = RhizomeConfig::default();
        assert_eq!(config.queues.len(), 5);
        assert!(config.queues.last().unwrap().size_threshold.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_unbounded_queue_in_the_middle() {
        let mut config = RhizomeConfig::default();
        config.queues[1].size_threshold = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_ascending_thresholds() {
        let mut config = RhizomeConfig::default();
        config.queues[1].size_threshold = Some(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn write_default_if_missing_creates_file() {
        let tmp = std::env::temp_dir().join(format!("rhizome-config-test-{}", std::process::id()));
        let config_path = tmp.join("config.toml");
        std::fs::create_dir_all(&tmp).unwrap();

        unsafe {
            std::env::set_var("RHIZOME_CONFIG", config_path.to_str().unwrap());
        }

        let path = RhizomeConfig::write_default_if_missing().expect("write should succeed");
        assert!(path.exists());

        let config = RhizomeConfig::load().expect("load should succeed");
        assert_eq!(config.queues.len(), 5);

        unsafe {
            std::env::remove_var("RHIZOME_CONFIG");
        }
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
