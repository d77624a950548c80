// Periodic cache maintenance: clear the disk cache on a fixed interval until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::DiskCache;

/// Spawn a task that clears `cache` every `period`, first one full period after start.
pub fn spawn_periodic_clear(
    cache: Arc<DiskCache>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("periodic cache clear stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = cache.clear().await {
                        warn!("periodic cache clear failed: {:#}", e);
                    }
                }
            }
        }
    })
}
