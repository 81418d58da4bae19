//! Cache Module
//!
//! A fixed-capacity key/value cache split into 256 shards. Each shard keeps its
//! records serialized inside a ring buffer and finds them through a sorted,
//! binary-searched secondary index.

mod bucket;
mod index;
mod record;
mod ring;
mod stats;
mod store;


// Re-export public types
pub use bucket::Bucket;
pub use index::{IndexEntry, IndexTable};
pub use record::{expire_at, now_secs, RecordHeader, HEADER_SIZE, SPARE_BYTES};
pub use stats::{CacheStats, ShardStats};
pub use store::{hash_key, Cache};

// == Public Constants ==
/// Number of shards in a cache
pub const SHARD_COUNT: usize = 256;

/// Number of index chunks in a shard
pub const CHUNK_COUNT: usize = 256;

/// Smallest accepted per-shard capacity in bytes
pub const MIN_SHARD_CAPACITY: usize = 128;

/// Largest accepted per-shard capacity; offsets are stored as `u32`
pub const MAX_SHARD_CAPACITY: usize = u32::MAX as usize;

/// Consecutive keep verdicts after which the reclaim loop evicts anyway
pub const MAX_CONSECUTIVE_KEEPS: u32 = 4;
