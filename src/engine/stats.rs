// Live statistics aggregation: cache hit rates, download volume, failures, in-flight fetches.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

struct StatsSample {
    at: Instant,
    download_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub download_bps: u64,
    pub downloaded_bytes: u64,
    pub downloads: u64,
    pub download_failures: u64,
    pub decode_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_writes: u64,
    pub active_fetches: u32,
    pub cache_hit_rate: f64,
}

pub struct StatsCollector {
    download_bytes_total: AtomicU64,
    downloads: AtomicU64,
    download_failures: AtomicU64,
    decode_failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_writes: AtomicU64,
    active_fetches: AtomicU32,
    last_sample: Mutex<StatsSample>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            download_bytes_total: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            download_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_writes: AtomicU64::new(0),
            active_fetches: AtomicU32::new(0),
            last_sample: Mutex::new(StatsSample {
                at: Instant::now(),
                download_bytes: 0,
            }),
        }
    }

    pub fn record_downloaded(&self, bytes: u64) {
        self.download_bytes_total.fetch_add(bytes, Ordering::Relaxed);
        self.downloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_failure(&self) {
        self.download_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fetches(&self) {
        self.active_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_fetches(&self) {
        self.active_fetches.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (current_download, download_bps) = {
            let mut sample = self.last_sample.lock();
            // Read under the lock so concurrent snapshots see a monotonic sample.
            let now = Instant::now();
            let current_download = self.download_bytes_total.load(Ordering::Relaxed);
            let elapsed = now.saturating_duration_since(sample.at).as_secs_f64();

            let bps = if elapsed > 0.1 {
                (current_download.saturating_sub(sample.download_bytes) as f64 / elapsed) as u64
            } else {
                0
            };

            // Update sample for next call
            sample.at = now;
            sample.download_bytes = current_download;

            (current_download, bps)
        };

        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_hit_rate = if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };

        StatsSnapshot {
            download_bps,
            downloaded_bytes: current_download,
            downloads: self.downloads.load(Ordering::Relaxed),
            download_failures: self.download_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_writes: self.cache_writes.load(Ordering::Relaxed),
            active_fetches: self.active_fetches.load(Ordering::Relaxed),
            cache_hit_rate,
        }
    }

    pub fn total_downloaded(&self) -> u64 {
        self.download_bytes_total.load(Ordering::Relaxed)
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
