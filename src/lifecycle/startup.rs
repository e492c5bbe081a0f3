//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Build the gateway, mount routes and start health monitors
//! - Bind the listener, serve, and tear everything down in order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last, so traffic only arrives once routes exist

use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError};
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::http::{AxumEngine, RouterEngine};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::{logging, metrics};

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub config_path: PathBuf,
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid metrics address `{address}`: {source}")]
    MetricsAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boot the gateway and serve until SIGINT/SIGTERM.
pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    let config = load_config(&options.config_path).map_err(|source| StartupError::Config {
        path: options.config_path.clone(),
        source,
    })?;

    logging::init_logging(&config.observability, options.verbose)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "context-gateway starting");
    tracing::info!(
        path = %options.config_path.display(),
        port = config.port,
        services = config.servers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr: SocketAddr = address.parse().map_err(|source| StartupError::MetricsAddress {
            address: address.clone(),
            source,
        })?;
        metrics::init_metrics(addr)?;
    }

    let port = config.port;
    let gateway = Gateway::new(config)?;

    let mut engine = AxumEngine::new();
    gateway.mount(&mut engine)?;
    gateway.start_health_monitors();

    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    let served = engine.run(listener, server_shutdown).await;
    gateway.shutdown().await;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
