//! Context Gateway
//!
//! A reverse proxy that maps context paths onto groups of backends, balances
//! them round-robin, and keeps them under active health checks.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  CONTEXT GATEWAY                  │
//!                         │                                                  │
//!     Client Request      │  ┌──────────┐    ┌──────────┐    ┌────────────┐  │
//!     ────────────────────┼─▶│   http   │───▶│ service  │───▶│   load     │  │
//!                         │  │  engine  │    │ (context)│    │  balancer  │  │
//!                         │  └──────────┘    └──────────┘    └─────┬──────┘  │
//!                         │       │                                │         │
//!                         │       ▼                                ▼         │
//!                         │  ┌──────────┐                   ┌────────────┐   │
//!                         │  │  admin   │                   │ forwarder  │───┼──▶ Upstream
//!                         │  │ /gateway │                   │ + latency  │   │
//!                         │  └──────────┘                   └────────────┘   │
//!                         │                                        ▲         │
//!                         │  ┌──────────────────────────────┐      │         │
//!                         │  │ health monitor (per service) │──────┘         │
//!                         │  └──────────────────────────────┘  probes        │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use context_gateway::lifecycle::{self, StartupOptions};

#[derive(Parser)]
#[command(name = "context-gateway", version)]
#[command(about = "Context-path reverse proxy with health-aware round robin", long_about = None)]
struct Cli {
    /// Path to the TOML or YAML configuration file
    #[arg(short, long, default_value = "/etc/context-gateway/config.toml")]
    config: PathBuf,

    /// Log everything at trace level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    lifecycle::run(StartupOptions {
        config_path: cli.config,
        verbose: cli.verbose,
    })
    .await?;

    Ok(())
}
