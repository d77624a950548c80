// Data source abstraction: where raw image bytes come from.

pub mod http_source;
pub mod traits;
