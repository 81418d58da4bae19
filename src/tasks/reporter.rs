//! Stats Reporter Task
//!
//! Background task that periodically logs aggregated cache statistics.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::Cache;
use crate::config::Config;

/// Spawns a background task that logs cache statistics every interval.
///
/// The task only reads counters; it never expires or evicts entries.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `interval_secs` - Interval in seconds between reports
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::new(64 * 1024)?);
/// let reporter = spawn_stats_reporter(cache.clone(), 60);
/// // Later, during shutdown:
/// reporter.abort();
/// ```
pub fn spawn_stats_reporter(cache: Arc<Cache>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting stats reporter with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let stats = cache.stats();
            info!(
                "Cache stats: entries={}, records={}, used={}/{} bytes, hit_rate={:.3}, evictions={}, expirations={}, relocations={}, dropped={}",
                stats.live_entries,
                stats.records,
                stats.used_bytes,
                stats.capacity_bytes,
                stats.hit_rate(),
                stats.counters.evictions,
                stats.counters.expirations,
                stats.counters.relocations,
                stats.counters.dropped
            );
        }
    })
}

/// Spawns the stats reporter using the interval from `config`.
pub fn spawn_stats_reporter_with_config(cache: Arc<Cache>, config: &Config) -> JoinHandle<()> {
    spawn_stats_reporter(cache, config.stats_interval_secs)
}
