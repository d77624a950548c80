// Dispatcher benchmark: time an uncached fetch+decode batch under each concurrency configuration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Url;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::Fetcher;
use crate::error::EngineError;

/// How many units of a batch may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolWidth {
    /// Every unit starts immediately on the I/O context.
    Unbounded,
    /// At most `n` units are in flight at once. This bounds concurrent units on
    /// the shared executor; it does not create a pool of `n` worker threads.
    Fixed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    label: String,
    width: PoolWidth,
}

impl DispatchConfig {
    pub fn new(label: impl Into<String>, width: PoolWidth) -> Self {
        Self {
            label: label.into(),
            width,
        }
    }

    pub fn io() -> Self {
        Self::new("IO", PoolWidth::Unbounded)
    }

    pub fn threads(workers: usize) -> Self {
        Self::new(format!("{} Threads", workers), PoolWidth::Fixed(workers))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> PoolWidth {
        self.width
    }
}

/// The benchmarked configurations, in run order.
pub fn default_dispatch_configs() -> Vec<DispatchConfig> {
    vec![
        DispatchConfig::io(),
        DispatchConfig::threads(2),
        DispatchConfig::threads(8),
        DispatchConfig::threads(16),
        DispatchConfig::threads(32),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkSample {
    pub label: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchmarkOutcome {
    Completed(Vec<BenchmarkSample>),
    /// The run was cancelled; `completed` holds the configs that finished before that.
    Cancelled { completed: Vec<BenchmarkSample> },
}

impl BenchmarkOutcome {
    pub fn samples(&self) -> &[BenchmarkSample] {
        match self {
            BenchmarkOutcome::Completed(samples) => samples,
            BenchmarkOutcome::Cancelled { completed } => completed,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BenchmarkOutcome::Cancelled { .. })
    }
}

/// Progress notifications, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    Status(String),
    Advanced { completed: usize, total: usize },
}

/// Receives benchmark progress. The benchmark awaits each call before moving on.
///
/// Implementations decide which context the notification is handled on; the
/// channel implementation hands it to whatever task drains the receiver.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn status(&self, message: String);
    async fn progress(&self, completed: usize, total: usize);
}

#[async_trait]
impl ProgressSink for mpsc::Sender<ProgressUpdate> {
    async fn status(&self, message: String) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(ProgressUpdate::Status(message)).await;
    }

    async fn progress(&self, completed: usize, total: usize) {
        let _ = self
            .send(ProgressUpdate::Advanced { completed, total })
            .await;
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn status(&self, _message: String) {}
    async fn progress(&self, _completed: usize, _total: usize) {}
}

/// Forwards progress to two plain callbacks, invoked on the benchmark's own task.
pub struct CallbackProgress<S, P> {
    on_status: S,
    on_progress: P,
}

impl<S, P> CallbackProgress<S, P>
where
    S: Fn(&str) + Send + Sync,
    P: Fn(usize) + Send + Sync,
{
    pub fn new(on_status: S, on_progress: P) -> Self {
        Self {
            on_status,
            on_progress,
        }
    }
}

#[async_trait]
impl<S, P> ProgressSink for CallbackProgress<S, P>
where
    S: Fn(&str) + Send + Sync,
    P: Fn(usize) + Send + Sync,
{
    async fn status(&self, message: String) {
        (self.on_status)(&message);
    }

    async fn progress(&self, completed: usize, _total: usize) {
        (self.on_progress)(completed);
    }
}

/// Check a benchmark locator count against `0 < count <= max`.
pub fn validate_locator_count(count: usize, max: usize) -> Result<(), EngineError> {
    if count == 0 || count > max {
        return Err(EngineError::InvalidLocatorCount { count, max });
    }
    Ok(())
}

pub struct ConcurrencyBenchmark {
    fetcher: Arc<Fetcher>,
    configs: Vec<DispatchConfig>,
    executor: Option<Handle>,
}

impl ConcurrencyBenchmark {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self {
            fetcher,
            configs: default_dispatch_configs(),
            executor: None,
        }
    }

    pub fn with_configs(mut self, configs: Vec<DispatchConfig>) -> Self {
        self.configs = configs;
        self
    }

    /// Spawn batch units on `handle` rather than the runtime `run` is polled on.
    pub fn with_executor(mut self, handle: Handle) -> Self {
        self.executor = Some(handle);
        self
    }

    pub fn configs(&self) -> &[DispatchConfig] {
        &self.configs
    }

    /// Run every config in order and return one sample per config.
    ///
    /// Configs never overlap: all units of one config finish before the next
    /// config's status is emitted. A failed unit does not abort its batch.
    pub async fn run(
        &self,
        locators: &[Url],
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> BenchmarkOutcome {
        let total = self.configs.len();
        let mut samples = Vec::with_capacity(total);

        for (index, config) in self.configs.iter().enumerate() {
            if cancel.is_cancelled() {
                return BenchmarkOutcome::Cancelled { completed: samples };
            }

            sink.status(format!("Testing {} dispatcher...", config.label()))
                .await;

            let Some(elapsed) = self.run_config(config, locators, cancel).await else {
                info!("benchmark cancelled during {}", config.label());
                return BenchmarkOutcome::Cancelled { completed: samples };
            };

            let sample = BenchmarkSample {
                label: config.label().to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
            };
            info!(
                "benchmark {} finished {} locators in {} ms",
                sample.label,
                locators.len(),
                sample.elapsed_ms
            );
            samples.push(sample);

            sink.status("Testing complete!".to_string()).await;
            sink.progress(index + 1, total).await;
        }

        BenchmarkOutcome::Completed(samples)
    }

    /// Time one batch. Returns `None` if cancelled before the batch drained.
    async fn run_config(
        &self,
        config: &DispatchConfig,
        locators: &[Url],
        cancel: &CancellationToken,
    ) -> Option<Duration> {
        let handle = self.executor.clone().unwrap_or_else(Handle::current);
        let limiter = match config.width() {
            PoolWidth::Unbounded => None,
            PoolWidth::Fixed(n) => Some(Arc::new(Semaphore::new(n.max(1)))),
        };

        let started = Instant::now();
        let mut units = JoinSet::new();
        for locator in locators {
            let fetcher = Arc::clone(&self.fetcher);
            let limiter = limiter.clone();
            let locator = locator.clone();
            units.spawn_on(
                async move {
                    let _permit = match limiter {
                        Some(semaphore) => match semaphore.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(_) => return false,
                        },
                        None => None,
                    };
                    fetcher.fetch_image(&locator).await.is_some()
                },
                &handle,
            );
        }

        let mut failed = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    units.abort_all();
                    return None;
                }
                joined = units.join_next() => match joined {
                    None => break,
                    Some(Ok(true)) => {}
                    Some(Ok(false)) => failed += 1,
                    Some(Err(e)) => {
                        failed += 1;
                        warn!("benchmark unit for {} panicked: {}", config.label(), e);
                    }
                },
            }
        }

        let elapsed = started.elapsed();
        if failed > 0 {
            debug!(
                "{} of {} units failed under {}",
                failed,
                locators.len(),
                config.label()
            );
        }
        Some(elapsed)
    }
}
