//! Configuration Module
//!
//! Cache sizing and reporting parameters. The embedding service owns where
//! these come from; this crate only parses and validates them.

use serde::{Deserialize, Serialize};

use crate::cache::{MAX_SHARD_CAPACITY, MIN_SHARD_CAPACITY};
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// Missing fields fall back to the defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ring buffer capacity of each of the 256 shards, in bytes
    pub shard_capacity: usize,
    /// Starting number of slots in each index chunk
    pub initial_chunk_capacity: usize,
    /// Interval in seconds between stats reports
    pub stats_interval_secs: u64,
}

impl Config {
    /// Parses a configuration from a JSON document and validates it.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(raw).map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.shard_capacity < MIN_SHARD_CAPACITY || self.shard_capacity > MAX_SHARD_CAPACITY {
            return Err(CacheError::InvalidCapacity(format!(
                "shard capacity {} must be between {} and {} bytes",
                self.shard_capacity, MIN_SHARD_CAPACITY, MAX_SHARD_CAPACITY
            )));
        }
        if self.initial_chunk_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "initial_chunk_capacity must be at least 1".to_string(),
            ));
        }
        if self.stats_interval_secs == 0 {
            return Err(CacheError::InvalidConfig(
                "stats_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_capacity: 64 * 1024,
            initial_chunk_capacity: 4,
            stats_interval_secs: 60,
        }
    }
}
