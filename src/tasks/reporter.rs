//! Stats Reporter Task
//!
//! Background task that periodically logs cache statistics.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ProxyCache;

/// Spawns a background task that logs a statistics line every interval.
///
/// The task never touches cache contents; it only takes a snapshot through
/// [`ProxyCache::stats`]. Abort the returned handle during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(ProxyCache::with_capacity(1024)?);
/// let reporter = spawn_stats_reporter(cache.clone(), 60);
/// // Later, during shutdown:
/// reporter.abort();
/// ```
pub fn spawn_stats_reporter(cache: Arc<ProxyCache>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting stats reporter with interval of {} seconds", interval.as_secs());

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        let mut last_activity = 0;
        loop {
            ticker.tick().await;

            let stats = cache.stats();
            let activity = stats.hits + stats.misses + stats.inserts + stats.updates;

            if activity == last_activity {
                debug!("Cache idle since last report");
                continue;
            }
            last_activity = activity;

            info!(
                entries = stats.total_entries,
                bytes = stats.current_size,
                capacity = stats.capacity,
                hit_rate = stats.hit_rate(),
                evictions = stats.evictions,
                "Cache stats"
            );
        }
    })
}
