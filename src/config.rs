//! Engine configuration
//!
//! Every field has a default, so an empty YAML document is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Several engines share one file store; every batch takes the writer lock
    /// and reloads the map when another engine checkpointed
    pub shared_mode: bool,

    /// Checkpoint resource
    pub map_path: String,

    /// Directory of committed change-log journals
    pub journal_path: String,

    /// Prefix of node data blobs
    pub data_path: String,

    /// Bound on the wait for the graph lock; unbounded when absent
    pub lock_timeout_ms: Option<u64>,

    pub persist_journal: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            shared_mode: false,
            map_path: "graph/map.json".to_string(),
            journal_path: "graph/journal".to_string(),
            data_path: "nodes".to_string(),
            lock_timeout_ms: None,
            persist_journal: true,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Shared-mode copy of this config
    pub fn shared(self) -> Self {
        EngineConfig {
            shared_mode: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_partial_yaml() {
        let config = EngineConfig::from_yaml_str("shared_mode: true\nlock_timeout_ms: 250\n").unwrap();
        assert!(config.shared_mode);
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.map_path, "graph/map.json");
        assert!(config.persist_journal);

        let empty = EngineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(empty, EngineConfig::default());
        assert_eq!(empty.lock_timeout(), None);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = EngineConfig {
            data_path: "blobs".to_string(),
            ..EngineConfig::default()
        };
        let text = config.to_yaml().unwrap();
        assert_eq!(EngineConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            EngineConfig::from_yaml_str("shared_mode: [1, 2"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        tokio::fs::write(&path, "data_path: blobs\n").await.unwrap();

        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.data_path, "blobs");
        assert!(EngineConfig::load(dir.path().join("missing.yaml")).await.is_err());
    }
}
