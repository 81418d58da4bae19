//! Cache Statistics Module
//!
//! Per-shard counters kept under the shard lock, and the aggregated snapshot
//! handed out by [`Cache::stats`](crate::cache::Cache::stats).

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Shard Stats ==
/// Counters for a single shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShardStats {
    /// Gets that returned a value
    pub hits: u64,
    /// Gets that found nothing, an expired record, or a tombstone
    pub misses: u64,
    /// Live records reclaimed as idle or forced out
    pub evictions: u64,
    /// Subset of evictions forced by the consecutive-keep limit
    pub forced_evictions: u64,
    /// Expired records reclaimed
    pub expirations: u64,
    /// Tombstoned records reclaimed
    pub tombstones_reclaimed: u64,
    /// Records moved from the head of the ring to its tail
    pub relocations: u64,
    /// Sets dropped for being too large for the shard
    pub dropped: u64,
}

impl ShardStats {
    // == Merge ==
    /// Adds another shard's counters into this one.
    pub fn merge(&mut self, other: &ShardStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.forced_evictions += other.forced_evictions;
        self.expirations += other.expirations;
        self.tombstones_reclaimed += other.tombstones_reclaimed;
        self.relocations += other.relocations;
        self.dropped += other.dropped;
    }
}

// == Cache Stats ==
/// Point-in-time view across every shard.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
    /// Summed shard counters
    #[serde(flatten)]
    pub counters: ShardStats,
    /// Records indexed and retrievable (expired ones included until reclaimed)
    pub live_entries: usize,
    /// Records in the ring windows, tombstones included
    pub records: usize,
    /// Bytes in use across all rings
    pub used_bytes: usize,
    /// Total ring capacity in bytes
    pub capacity_bytes: usize,
}

impl CacheStats {
    /// Creates an empty snapshot stamped with the current time.
    pub fn new() -> Self {
        Self {
            captured_at: Utc::now(),
            counters: ShardStats::default(),
            live_entries: 0,
            records: 0,
            used_bytes: 0,
            capacity_bytes: 0,
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.counters.hits + self.counters.misses;
        if total == 0 {
            0.0
        } else {
            self.counters.hits as f64 / total as f64
        }
    }

    /// Fraction of ring capacity in use.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.capacity_bytes as f64
        }
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}
