// Two-stage image fetch: download raw bytes from a source, then decode them off the async workers.

use std::sync::Arc;

use bytes::Bytes;
use image::DynamicImage;
use reqwest::Url;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::codec::decode_image;
use super::stats::StatsCollector;
use crate::source::traits::ImageSource;

/// Keeps the in-flight counter balanced even when the download future is dropped.
struct ActiveFetch<'a>(&'a StatsCollector);

impl<'a> ActiveFetch<'a> {
    fn enter(stats: &'a StatsCollector) -> Self {
        stats.increment_fetches();
        Self(stats)
    }
}

impl Drop for ActiveFetch<'_> {
    fn drop(&mut self) {
        self.0.decrement_fetches();
    }
}

pub struct Fetcher {
    source: Arc<dyn ImageSource>,
    stats: Arc<StatsCollector>,
    decode_executor: Option<Handle>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn ImageSource>, stats: Arc<StatsCollector>) -> Self {
        Self {
            source,
            stats,
            decode_executor: None,
        }
    }

    /// Run decodes on the blocking pool of `handle` instead of the caller's runtime.
    pub fn with_decode_executor(mut self, handle: Handle) -> Self {
        self.decode_executor = Some(handle);
        self
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    /// Download the payload behind `locator`. Failures are logged and reported as `None`.
    pub async fn download(&self, locator: &Url) -> Option<Bytes> {
        let result = {
            let _active = ActiveFetch::enter(&self.stats);
            self.source.fetch(locator).await
        };

        match result {
            Ok(data) => {
                self.stats.record_downloaded(data.len() as u64);
                debug!("downloaded {} ({} bytes)", locator, data.len());
                Some(data)
            }
            Err(e) => {
                self.stats.record_download_failure();
                warn!("download {} failed: {}", locator, e);
                None
            }
        }
    }

    /// Decode `data` into an image without blocking the calling task.
    pub async fn decode(&self, data: Bytes) -> Option<DynamicImage> {
        let task = move || decode_image(&data);
        let joined = match &self.decode_executor {
            Some(handle) => handle.spawn_blocking(task).await,
            None => tokio::task::spawn_blocking(task).await,
        };

        match joined {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                self.stats.record_decode_failure();
                warn!("decode failed: {}", e);
                None
            }
            Err(e) => {
                self.stats.record_decode_failure();
                warn!("decode task failed: {}", e);
                None
            }
        }
    }

    /// Download then decode, with no cache involvement.
    pub async fn fetch_image(&self, locator: &Url) -> Option<DynamicImage> {
        let data = self.download(locator).await?;
        self.decode(data).await
    }
}
