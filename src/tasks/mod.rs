//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache.
//!
//! # Tasks
//! - Stats Reporter: logs aggregated cache statistics at a fixed interval

mod reporter;

pub use reporter::{spawn_stats_reporter, spawn_stats_reporter_with_config};
