use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Age after which a cached entry is treated as stale (5 minutes).
pub const CACHE_EXPIRY_MS: u64 = 300_000;

/// JPEG quality used when re-encoding images into the cache.
pub const CACHE_JPEG_QUALITY: u8 = 100;

/// Upper bound on the number of locators a single benchmark run accepts.
pub const MAX_BENCHMARK_LOCATORS: usize = 128;

/// Interval between periodic cache clears (15 minutes).
pub const CACHE_CLEAR_INTERVAL_SECS: u64 = 15 * 60;

/// Maximum accepted size for a single image response (32 MB).
pub const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

/// Base URL the gallery images are served from.
pub const DEFAULT_ENDPOINT: &str = "https://daa.iict.ch/images/";

/// File extension appended to every image id.
pub const DEFAULT_FILE_EXTENSION: &str = ".jpg";

/// Top-level configuration for the gallery engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory used for on-disk cache files.
    pub cache_dir: PathBuf,
    /// Base URL image ids are appended to.
    pub endpoint: String,
    /// Extension appended after the image id.
    pub file_extension: String,
    /// Cache expiry window in milliseconds.
    pub expiry_ms: u64,
    /// Quality used when re-encoding images into the cache (1..=100).
    pub jpeg_quality: u8,
    /// Largest locator list a benchmark run accepts.
    pub max_benchmark_locators: usize,
    /// Period of the background cache clear.
    pub clear_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Responses larger than this are rejected.
    pub max_image_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("gallery-engine"),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            expiry_ms: CACHE_EXPIRY_MS,
            jpeg_quality: CACHE_JPEG_QUALITY,
            max_benchmark_locators: MAX_BENCHMARK_LOCATORS,
            clear_interval_secs: CACHE_CLEAR_INTERVAL_SECS,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(EngineError::InvalidConfig("cache_dir must not be empty".into()));
        }
        if self.expiry_ms == 0 {
            return Err(EngineError::InvalidConfig("expiry_ms must be > 0".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(EngineError::InvalidConfig(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.max_benchmark_locators == 0 {
            return Err(EngineError::InvalidConfig(
                "max_benchmark_locators must be > 0".into(),
            ));
        }
        if self.clear_interval_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "clear_interval_secs must be > 0".into(),
            ));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(EngineError::InvalidConfig("timeouts must be > 0".into()));
        }
        if self.max_image_bytes == 0 {
            return Err(EngineError::InvalidConfig("max_image_bytes must be > 0".into()));
        }
        Ok(())
    }

    pub fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms)
    }

    pub fn clear_interval(&self) -> Duration {
        Duration::from_secs(self.clear_interval_secs)
    }
}
