//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! Keys are kebab-case so the same file reads naturally as TOML or YAML.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GatewayConfig {
    /// Port the proxy and introspection endpoints listen on.
    pub port: u16,

    /// Proxied services, one per context path.
    pub servers: Vec<ServerConfig>,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 80,
            servers: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// One proxied service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Unique service name, used for identification only.
    pub name: String,

    /// URL prefix routed to this service. `/api` proxies `/api` and `/api/*`.
    pub context: String,

    /// Backend addresses traffic is balanced across.
    #[serde(default)]
    pub upstreams: Vec<String>,

    /// HTTP methods proxied for this service (e.g. `GET`, `POST`).
    #[serde(default)]
    pub allowed_methods: Vec<String>,

    /// Active health check policy.
    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

/// Active health check settings for one service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HealthCheckConfig {
    /// Path probed on every upstream. Empty probes the bare upstream address.
    pub endpoint: String,

    /// Probe interval in milliseconds.
    pub interval: u32,

    /// Consecutive failed probes before an upstream is marked unhealthy.
    pub fails: u32,

    /// Deadline for a single probe in milliseconds.
    pub timeout: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            interval: 5_000,
            fails: 3,
            timeout: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
