//! Cluster Configuration
//!
//! Tunables shared by the name service, the data services and their timers.
//! Defaults match a four-node fleet with 3-way replication and 2 MiB chunks.
//! A JSON file can override any subset of fields; CLI flags are applied on top
//! of that in `main.rs`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

pub const CHUNK_SIZE: usize = 2 * 1024 * 1024;
pub const REPLICATION_FACTOR: usize = 3;
pub const DATA_SERVICES: usize = 4;

const HEARTBEAT_INTERVAL_MS: u64 = 10_000;
const HEARTBEAT_TIMEOUT_MS: u64 = 30_000;
const MONITOR_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DfsConfig {
    /// Parent directory of every service's storage root.
    pub root: PathBuf,
    pub data_services: usize,
    pub chunk_size: usize,
    pub replication_factor: usize,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    pub monitor_interval_ms: u64,
}

impl Default for DfsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./dfs"),
            data_services: DATA_SERVICES,
            chunk_size: CHUNK_SIZE,
            replication_factor: REPLICATION_FACTOR,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            heartbeat_timeout_ms: HEARTBEAT_TIMEOUT_MS,
            monitor_interval_ms: MONITOR_INTERVAL_MS,
        }
    }
}

impl DfsConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: DfsConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn name_root(&self) -> PathBuf {
        self.root.join("nameserver")
    }

    pub fn data_root(&self, index: usize) -> PathBuf {
        self.root.join(format!("dataserver{}", index))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DfsConfig::default();
        assert_eq!(config.chunk_size, 2 * 1024 * 1024);
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.data_services, 4);
        assert_eq!(config.heartbeat_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dfs.json");
        std::fs::write(&path, r#"{ "chunk_size": 4, "root": "/tmp/x" }"#).unwrap();

        let config = DfsConfig::from_json_file(&path).unwrap();
        assert_eq!(config.chunk_size, 4);
        assert_eq!(config.root, PathBuf::from("/tmp/x"));
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.data_root(2), PathBuf::from("/tmp/x/dataserver2"));
    }
}
