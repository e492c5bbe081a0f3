//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, upstream latency, health, probe failures)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by service, status
//! - `gateway_upstream_latency_seconds` (histogram): forward round-trip per upstream
//! - `gateway_upstream_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_probe_failures_total` (counter): failed health probes per upstream
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Labels are limited to service name, upstream target and status code

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const UPSTREAM_LATENCY_SECONDS: &str = "gateway_upstream_latency_seconds";
pub const UPSTREAM_HEALTHY: &str = "gateway_upstream_healthy";
pub const PROBE_FAILURES_TOTAL: &str = "gateway_probe_failures_total";

/// Install the Prometheus recorder and its HTTP scrape listener on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(service: &str, status: u16) {
    counter!(REQUESTS_TOTAL, "service" => service.to_string(), "status" => status.to_string()).increment(1);
}

pub fn record_upstream_latency(upstream: &str, elapsed: Duration) {
    histogram!(UPSTREAM_LATENCY_SECONDS, "upstream" => upstream.to_string()).record(elapsed.as_secs_f64());
}

pub fn record_upstream_health(upstream: &str, healthy: bool) {
    gauge!(UPSTREAM_HEALTHY, "upstream" => upstream.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_probe_failure(upstream: &str) {
    counter!(PROBE_FAILURES_TOTAL, "upstream" => upstream.to_string()).increment(1);
}
