//! Configuration for the trust-line store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// RocksDB configuration
    #[serde(default)]
    pub rocksdb: RocksDBConfig,

    /// Reconciliation policy
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/trust-lines"),
            service_name: "trustline-store".to_string(),
            rocksdb: RocksDBConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            target_file_size_mb: 64,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// What to do with an entry older than the row it would replace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleEntryPolicy {
    /// Replace the row anyway; the ingestion pipeline owns ordering
    #[default]
    Overwrite,
    /// Fail the whole batch with `StaleEntry`
    Reject,
}

impl FromStr for StaleEntryPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(StaleEntryPolicy::Overwrite),
            "reject" => Ok(StaleEntryPolicy::Reject),
            _ => Err(crate::Error::Config(format!("Unknown stale entry policy: {}", s))),
        }
    }
}

/// Reconciliation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Policy for out-of-order entries
    #[serde(default)]
    pub stale_entries: StaleEntryPolicy,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML document
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("TRUSTLINE_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(policy) = std::env::var("TRUSTLINE_STALE_ENTRIES") {
            config.reconcile.stale_entries = policy.parse()?;
        }

        Ok(config)
    }
}
