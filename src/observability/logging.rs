//! Structured logging.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails if a global
/// subscriber is already set.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(config.json.then(|| fmt::layer().json()))
        .with((!config.json).then(fmt::layer))
        .try_init()
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("resilient_call={level}"))
}
