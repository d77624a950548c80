// Embedding surface: logging setup and the engine facade.

pub mod gallery;
pub mod logging;
