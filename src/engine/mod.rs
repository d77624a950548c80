// Engine: disk cache, fetch pipeline, cache orchestration, slot bindings and the dispatcher benchmark.

pub mod benchmark;
pub mod binding;
pub mod cache;
pub mod clock;
pub mod codec;
pub mod fetcher;
pub mod locator;
pub mod maintenance;
pub mod orchestrator;
pub mod stats;
