use std::sync::Once;
use tracing::info;
use tracing_subscriber::EnvFilter;

static INIT_TRACING: Once = Once::new();

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Install the global tracing subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: Option<&str>) {
    INIT_TRACING.call_once(|| {
        let fallback = default_filter.unwrap_or(DEFAULT_LOG_FILTER);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(fallback));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("gallery engine tracing initialized");
    });
}
