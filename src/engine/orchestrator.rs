// Get-or-populate: serve an image from the disk cache, or fetch, decode and store it.

use std::sync::Arc;

use image::DynamicImage;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::DiskCache;
use super::fetcher::Fetcher;
use super::locator::cache_key_for;

pub struct CacheOrchestrator {
    cache: Arc<DiskCache>,
    fetcher: Arc<Fetcher>,
}

impl CacheOrchestrator {
    pub fn new(cache: Arc<DiskCache>, fetcher: Arc<Fetcher>) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// Resolve `key`, fetching from `locator` on a cache miss.
    ///
    /// Concurrent calls for the same key are not coalesced; each one may
    /// fetch and the last write wins.
    pub async fn resolve(&self, key: &str, locator: &Url) -> Option<DynamicImage> {
        self.resolve_cancellable(key, locator, &CancellationToken::new())
            .await
    }

    /// Like [`resolve`](Self::resolve), abandoning the work once `token` fires.
    ///
    /// Lookup and fetch are dropped as soon as the token fires. The store step
    /// runs to completion and publishes nothing if the token fired first, so a
    /// call that returns `None` never leaves an entry behind.
    pub async fn resolve_cancellable(
        &self,
        key: &str,
        locator: &Url,
        token: &CancellationToken,
    ) -> Option<DynamicImage> {
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("resolve {} cancelled", key);
                return None;
            }
            fetched = self.lookup(key, locator) => fetched?,
        };

        match fetched {
            Lookup::Cached(image) => Some(image),
            Lookup::Fetched(image) => self.store(key, image, token).await,
        }
    }

    /// Resolve using the key derived from the locator's trailing path segment.
    pub async fn resolve_locator(
        &self,
        locator: &Url,
        token: &CancellationToken,
    ) -> Option<DynamicImage> {
        let Some(key) = cache_key_for(locator) else {
            warn!("no cache key can be derived from {}", locator);
            return None;
        };
        self.resolve_cancellable(&key, locator, token).await
    }

    async fn lookup(&self, key: &str, locator: &Url) -> Option<Lookup> {
        let stats = self.fetcher.stats();

        if let Some(data) = self.cache.get(key).await {
            stats.record_cache_hit();
            if let Some(image) = self.fetcher.decode(data).await {
                return Some(Lookup::Cached(image));
            }
            // An undecodable entry is treated like a miss and refetched.
            debug!("cache entry {} unusable, refetching", key);
        } else {
            stats.record_cache_miss();
        }

        let data = self.fetcher.download(locator).await?;
        let image = self.fetcher.decode(data).await?;
        Some(Lookup::Fetched(image))
    }

    async fn store(
        &self,
        key: &str,
        image: DynamicImage,
        token: &CancellationToken,
    ) -> Option<DynamicImage> {
        match self.cache.set_unless_cancelled(key, &image, token).await {
            Ok(true) => self.fetcher.stats().record_cache_write(),
            Ok(false) => {
                debug!("resolve {} cancelled before store", key);
                return None;
            }
            Err(e) => warn!("cache write {} failed: {:#}", key, e),
        }
        Some(image)
    }
}

enum Lookup {
    Cached(DynamicImage),
    Fetched(DynamicImage),
}
