//! Upstream abstraction.
//!
//! # Responsibilities
//! - Represent a single backend instance of a service
//! - Own the forwarder bound to the backend address
//! - Guard health and latency state behind one per-upstream lock
//!
//! # Design Decisions
//! - Health and stats are updated together by two writers (the monitor and
//!   request tasks), so they share one `Mutex` instead of separate atomics
//! - The lock is never held across an `.await`

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use url::{Position, Url};

use crate::error::GatewayError;
use crate::health::state::{HealthTransition, UpstreamHealth};
use crate::proxy::forwarder::{join_path, Forwarder, HttpClient};

/// Rolling request statistics of one upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStats {
    /// Smoothed round-trip latency in milliseconds.
    pub average_latency: f64,
}

#[derive(Debug, Default)]
struct UpstreamState {
    health: UpstreamHealth,
    stats: UpstreamStats,
}

/// Point-in-time view of an upstream for the introspection API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSnapshot {
    pub target: String,
    pub health_stats: UpstreamHealth,
    pub stats: UpstreamStats,
}

/// A single backend instance.
#[derive(Debug)]
pub struct Upstream {
    target: Url,
    forwarder: Forwarder,
    state: Mutex<UpstreamState>,
}

impl Upstream {
    /// Parse `address` and bind a forwarder to it. Starts healthy with
    /// zeroed stats.
    pub fn new(address: &str, client: HttpClient) -> Result<Self, GatewayError> {
        let target = parse_upstream_address(address)?;
        Ok(Self {
            forwarder: Forwarder::new(target.clone(), client),
            target,
            state: Mutex::new(UpstreamState::default()),
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    pub fn is_healthy(&self) -> bool {
        self.lock().health.healthy
    }

    pub fn health(&self) -> UpstreamHealth {
        self.lock().health.clone()
    }

    pub fn stats(&self) -> UpstreamStats {
        self.lock().stats
    }

    /// URL probed by the health monitor: the target joined with `endpoint`,
    /// or the bare target when no endpoint is configured.
    pub fn probe_url(&self, endpoint: &str) -> String {
        if endpoint.is_empty() {
            return self.target.to_string();
        }
        let mut url = format!(
            "{}{}",
            &self.target[..Position::BeforePath],
            join_path(self.target.path(), endpoint)
        );
        if let Some(query) = self.target.query() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    pub fn record_probe_success(&self) -> HealthTransition {
        self.lock().health.record_success()
    }

    pub fn record_probe_failure(&self, error: impl Into<String>, threshold: u32) -> HealthTransition {
        self.lock().health.record_failure(error, threshold)
    }

    /// Fold a latency sample into the running average and return the new value.
    pub fn record_latency(&self, sample: Duration) -> f64 {
        let sample_ms = sample.as_nanos() as f64 / 1_000_000.0;
        let mut state = self.lock();
        state.stats.average_latency = (state.stats.average_latency + sample_ms) / 2.0;
        state.stats.average_latency
    }

    pub fn snapshot(&self) -> UpstreamSnapshot {
        let state = self.lock();
        UpstreamSnapshot {
            target: self.target.to_string(),
            health_stats: state.health.clone(),
            stats: state.stats,
        }
    }

    fn lock(&self) -> MutexGuard<'_, UpstreamState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock still guards valid data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse a configured backend address. Accepts `http://host[:port][/path]`
/// or a bare `host:port`.
pub fn parse_upstream_address(address: &str) -> Result<Url, GatewayError> {
    let trimmed = address.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| GatewayError::invalid_address(address, e))?;

    if url.scheme() != "http" {
        return Err(GatewayError::invalid_address(
            address,
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(GatewayError::invalid_address(address, "missing host"));
    }

    Ok(url)
}
