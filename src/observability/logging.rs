//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Pick the filter from `RUST_LOG`, the CLI, or the configured level
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` always wins so operators can narrow output without a redeploy

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    format!("context_gateway={level},tower_http=info")
}

/// Install the global subscriber. `verbose` forces `trace` for the gateway.
///
/// Returns an error when a subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig, verbose: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = if verbose { "trace" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}
