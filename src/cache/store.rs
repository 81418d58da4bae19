//! Cache Store Module
//!
//! Fan-out of 256 independently locked shards. Every key is routed to exactly
//! one shard by the low byte of its primary hash.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::cache::record::{expire_at, now_secs};
use crate::cache::{Bucket, CacheStats, SHARD_COUNT};
use crate::config::Config;
use crate::error::Result;

/// Rolling polynomial hash used to pick a shard and an index chunk.
pub fn hash_key(key: &[u8]) -> u32 {
    key.iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}

// == Cache ==
/// Sharded cache of byte values.
///
/// `get` refreshes access times, so reads and writes share one exclusive
/// lock per shard.
#[derive(Debug)]
pub struct Cache {
    shards: Box<[Mutex<Bucket>]>,
    shard_capacity: usize,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache of 256 shards holding `shard_capacity` bytes each.
    pub fn new(shard_capacity: usize) -> Result<Self> {
        Self::with_config(&Config {
            shard_capacity,
            ..Config::default()
        })
    }

    /// Creates a cache from a validated configuration.
    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let shards = (0..SHARD_COUNT)
            .map(|_| {
                Mutex::new(Bucket::new(
                    config.shard_capacity,
                    config.initial_chunk_capacity,
                ))
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        info!(
            "Cache initialized: shards={}, shard_capacity={} bytes, total={} bytes",
            SHARD_COUNT,
            config.shard_capacity,
            SHARD_COUNT * config.shard_capacity
        );

        Ok(Self {
            shards,
            shard_capacity: config.shard_capacity,
        })
    }

    fn shard(&self, hash: u32) -> &Mutex<Bucket> {
        &self.shards[(hash & 0xFF) as usize]
    }

    // == Set ==
    /// Stores a value; a zero `ttl` never expires.
    ///
    /// Values too large for a shard are silently not cached.
    pub fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        let hash = hash_key(key.as_bytes());
        let now = now_secs();
        self.shard(hash)
            .lock()
            .set_at(key.as_bytes(), value, hash, expire_at(now, ttl), now);
    }

    // == Get ==
    /// Returns a copy of the value if present and not expired.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let hash = hash_key(key.as_bytes());
        self.shard(hash)
            .lock()
            .get_at(key.as_bytes(), hash, now_secs())
    }

    // == Delete ==
    /// Removes a key. Returns true if it was indexed.
    pub fn del(&self, key: &str) -> bool {
        let hash = hash_key(key.as_bytes());
        self.shard(hash).lock().del(key.as_bytes(), hash)
    }

    // == Stats ==
    /// Aggregates counters and occupancy across all shards.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::new();
        for shard in self.shards.iter() {
            let bucket = shard.lock();
            stats.counters.merge(&bucket.stats());
            stats.live_entries += bucket.live_entries();
            stats.records += bucket.len();
            stats.used_bytes += bucket.used_bytes();
            stats.capacity_bytes += bucket.capacity();
        }
        stats
    }

    // == Length ==
    /// Number of indexed entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().live_entries()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity of each shard in bytes.
    pub fn shard_capacity(&self) -> usize {
        self.shard_capacity
    }
}
