// Typed errors for caller-facing validation. Transient fetch/decode failures never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("locator count must be > 0 and <= {max}, got {count}")]
    InvalidLocatorCount { count: usize, max: usize },

    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),
}
