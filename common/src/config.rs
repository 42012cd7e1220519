use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;
const DEFAULT_REPLICATION_FACTOR: u32 = 3;
const DEFAULT_CHUNK_UPLOAD_DEADLINE_SECS: u64 = 60;
const DEFAULT_NODE_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HEALTH_PROBE_INTERVAL_SECS: u64 = 60;
const DEFAULT_FAN_OUT: usize = 4;

/// Per-namespace cache TTLs, in seconds (§4.5).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub chunk_data_secs: u64,
    pub file_metadata_secs: u64,
    pub user_files_secs: u64,
    pub share_info_secs: u64,
    pub nodes_health_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            chunk_data_secs: 3600,
            file_metadata_secs: 600,
            user_files_secs: 300,
            share_info_secs: 1800,
            nodes_health_secs: 300,
        }
    }
}

/// Recognized configuration options (§6). Mirrors `skie-service`'s
/// `ServiceConfig`: load from TOML if present, otherwise write the defaults
/// back out so the file becomes the source of truth for the next run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkVaultConfig {
    /// Bytes per chunk on split.
    pub chunk_size: u64,
    /// `R`, target replicas per chunk.
    pub replication_factor: u32,
    /// Ordered list of storage-node base URLs.
    pub storage_nodes: Vec<String>,
    /// Per-chunk quorum deadline observed by the coordinator, in seconds.
    pub chunk_upload_deadline_secs: u64,
    /// Per PUT/GET timeout against a storage node, in seconds.
    pub node_request_timeout_secs: u64,
    /// Cadence of `ProbeNodes`, in seconds.
    pub health_probe_interval_secs: u64,
    /// Cron schedule for the nightly verification sweep.
    pub verification_schedule: String,
    /// Cron schedule for expired-share cleanup.
    pub share_cleanup_schedule: String,
    /// Max chunks uploaded concurrently for a single file.
    pub fan_out: usize,
    pub cache_ttls: CacheTtls,
}

impl Default for ChunkVaultConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            storage_nodes: Vec::new(),
            chunk_upload_deadline_secs: DEFAULT_CHUNK_UPLOAD_DEADLINE_SECS,
            node_request_timeout_secs: DEFAULT_NODE_REQUEST_TIMEOUT_SECS,
            health_probe_interval_secs: DEFAULT_HEALTH_PROBE_INTERVAL_SECS,
            verification_schedule: "0 3 * * *".to_string(),
            share_cleanup_schedule: "0 2 * * *".to_string(),
            fan_out: DEFAULT_FAN_OUT,
            cache_ttls: CacheTtls::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ChunkVaultConfig {
    /// Loads configuration from `path`, writing the defaults to `path` first
    /// if it doesn't exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml::to_string_pretty(&config)?)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn quorum(&self) -> u32 {
        crate::quorum(self.replication_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_defaults_then_loads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let loaded = ChunkVaultConfig::load_or_init(&path).unwrap();
        assert_eq!(loaded.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(loaded.replication_factor, DEFAULT_REPLICATION_FACTOR);

        let reloaded = ChunkVaultConfig::load_or_init(&path).unwrap();
        assert_eq!(reloaded.chunk_size, loaded.chunk_size);
    }

    #[test]
    fn quorum_derives_from_replication_factor() {
        let mut config = ChunkVaultConfig::default();
        config.replication_factor = 5;
        assert_eq!(config.quorum(), 3);
    }
}
