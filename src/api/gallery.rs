use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;
use reqwest::Url;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::EngineConfig;
use crate::engine::benchmark::{
    validate_locator_count, BenchmarkOutcome, ConcurrencyBenchmark, ProgressSink,
};
use crate::engine::binding::BindingScope;
use crate::engine::cache::DiskCache;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::fetcher::Fetcher;
use crate::engine::locator::locators_for;
use crate::engine::maintenance::spawn_periodic_clear;
use crate::engine::orchestrator::CacheOrchestrator;
use crate::engine::stats::{StatsCollector, StatsSnapshot};
use crate::error::EngineError;
use crate::source::http_source::HttpSource;
use crate::source::traits::ImageSource;

/// Process-wide handle wiring the cache, fetcher and benchmark together.
pub struct GalleryEngine {
    config: EngineConfig,
    cache: Arc<DiskCache>,
    fetcher: Arc<Fetcher>,
    orchestrator: Arc<CacheOrchestrator>,
    stats: Arc<StatsCollector>,
}

impl GalleryEngine {
    /// Build an engine fetching over HTTP.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let source = Arc::new(HttpSource::from_config(&config)?);
        Self::with_source(config, source)
    }

    /// Build an engine around an arbitrary image source.
    pub fn with_source(config: EngineConfig, source: Arc<dyn ImageSource>) -> Result<Self> {
        Self::with_source_and_clock(config, source, Arc::new(SystemClock))
    }

    /// Like [`with_source`](Self::with_source), with the cache's expiry clock replaced.
    pub fn with_source_and_clock(
        config: EngineConfig,
        source: Arc<dyn ImageSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = DiskCache::configure(&config.cache_dir)?
            .with_expiry(config.expiry())
            .with_quality(config.jpeg_quality)
            .with_clock(clock);
        Ok(Self::assemble(config, cache, source))
    }

    fn assemble(config: EngineConfig, cache: DiskCache, source: Arc<dyn ImageSource>) -> Self {
        let stats = Arc::new(StatsCollector::new());
        let cache = Arc::new(cache);
        let fetcher = Arc::new(Fetcher::new(source, Arc::clone(&stats)));
        let orchestrator = Arc::new(CacheOrchestrator::new(
            Arc::clone(&cache),
            Arc::clone(&fetcher),
        ));
        info!(
            "gallery engine ready cache={} endpoint={}",
            cache.root().display(),
            config.endpoint
        );

        Self {
            config,
            cache,
            fetcher,
            orchestrator,
            stats,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    pub fn orchestrator(&self) -> &Arc<CacheOrchestrator> {
        &self.orchestrator
    }

    /// Locators for image ids `1..=count` under the configured endpoint.
    pub fn locators(&self, count: usize) -> Vec<Url> {
        locators_for(&self.config.endpoint, &self.config.file_extension, count)
    }

    /// Locators for a benchmark run of `count` images, checked against the
    /// configured maximum before any locator is built.
    pub fn benchmark_locators(&self, count: usize) -> Result<Vec<Url>, EngineError> {
        validate_locator_count(count, self.config.max_benchmark_locators)?;
        Ok(self.locators(count))
    }

    /// Locator for a single image id.
    pub fn locator_for_id(&self, id: u64) -> Result<Url> {
        let raw = format!("{}{}{}", self.config.endpoint, id, self.config.file_extension);
        Ok(Url::parse(&raw)?)
    }

    /// Cache-backed lookup of a single image.
    pub async fn resolve(&self, locator: &Url) -> Option<DynamicImage> {
        self.orchestrator
            .resolve_locator(locator, &CancellationToken::new())
            .await
    }

    /// A fresh binding scope for one display surface.
    pub fn binding_scope(&self) -> BindingScope {
        BindingScope::new(Arc::clone(&self.orchestrator))
    }

    /// Drop every cached entry. Used for manual refresh.
    pub async fn refresh(&self) -> Result<()> {
        self.cache.clear().await
    }

    /// Start clearing the cache every `clear_interval_secs` until `shutdown` fires.
    pub fn spawn_maintenance(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        spawn_periodic_clear(
            Arc::clone(&self.cache),
            self.config.clear_interval(),
            shutdown,
        )
    }

    /// Benchmark the dispatcher configs over `locators` after validating the count.
    pub async fn run_benchmark(
        &self,
        locators: &[Url],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<BenchmarkOutcome, EngineError> {
        validate_locator_count(locators.len(), self.config.max_benchmark_locators)?;
        let benchmark = ConcurrencyBenchmark::new(Arc::clone(&self.fetcher));
        Ok(benchmark.run(locators, sink, cancel).await)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
