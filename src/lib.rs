//! Concurrent image fetching with an expiring disk cache, plus a benchmark
//! comparing fetch throughput across dispatcher configurations.

pub mod api;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod source;

pub use api::gallery::GalleryEngine;
pub use config::EngineConfig;
pub use error::EngineError;
