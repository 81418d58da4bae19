//! Ring Cache - A sharded in-process key/value cache
//!
//! Stores serialized records in fixed-capacity ring buffers, with lazy TTL
//! expiration and recency-biased eviction.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::Cache;
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{spawn_stats_reporter, spawn_stats_reporter_with_config};
