//! Expiry Sweeper Task
//!
//! Background task that periodically removes expired cache entries.
//!
//! Expired entries are normally kept so they can be served stale; run the
//! sweeper only when that is not wanted.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::Config;

/// Spawns a background task that periodically calls [`Cache::clear_expired`].
///
/// Sweeps are skipped while the cache is disabled. Store failures are logged
/// and the task keeps running.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_expiry_sweeper(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_expiry_sweeper(cache: Cache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "starting expiry sweeper");

        loop {
            tokio::time::sleep(interval).await;

            if !cache.is_enabled() {
                debug!("expiry sweep skipped, cache disabled");
                continue;
            }

            match cache.clear_expired().await {
                Ok(0) => debug!("expiry sweep: no expired entries found"),
                Ok(removed) => info!(removed, "expiry sweep removed entries"),
                Err(err) => warn!(error = %err, "expiry sweep failed"),
            }
        }
    })
}

/// Spawns the expiry sweeper at `config.sweep_interval`.
///
/// Returns `None` without spawning anything when the interval is zero.
pub fn spawn_configured_sweeper(cache: Cache, config: &Config) -> Option<JoinHandle<()>> {
    if config.sweep_interval.is_zero() {
        debug!("expiry sweeper disabled by configuration");
        return None;
    }
    Some(spawn_expiry_sweeper(cache, config.sweep_interval))
}
