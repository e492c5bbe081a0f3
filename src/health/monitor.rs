//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every upstream of one service
//! - Fold probe results into upstream health state
//! - Stop on request, with no tick starting after `stop` returns
//!
//! # Design Decisions
//! - One task per service; probes within a tick run sequentially
//! - Any HTTP response counts as success, only transport failures and
//!   timeouts count against the upstream
//! - The first probe runs one interval after start; missed ticks are delayed

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::USER_AGENT;
use axum::http::{Method, Request};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::GatewayError;
use crate::health::state::HealthTransition;
use crate::observability::metrics;
use crate::proxy::forwarder::HttpClient;
use crate::proxy::service::{HealthCheckPolicy, Service};
use crate::proxy::upstream::Upstream;

const PROBE_USER_AGENT: &str = concat!("context-gateway-health-check/", env!("CARGO_PKG_VERSION"));

/// Handle to the background probe task of one service.
#[derive(Debug)]
pub struct HealthMonitor {
    service: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawn the probe task for `service`.
    pub fn start(service: Arc<Service>, client: HttpClient) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let name = service.name().to_string();
        let task = tokio::spawn(run(service, client, stop_rx));

        Self {
            service: name,
            stop_tx,
            task,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop and wait for it. An in-flight probe round
    /// is abandoned.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);

        if let Err(e) = self.task.await {
            tracing::error!(service = %self.service, error = %e, "Health monitor task failed");
        }
    }
}

async fn run(service: Arc<Service>, client: HttpClient, mut stop_rx: watch::Receiver<bool>) {
    let policy = service.health_policy().clone();
    let period = policy.interval();
    if period.is_zero() {
        tracing::error!(service = %service.name(), "Health check interval is zero, monitor not started");
        return;
    }

    tracing::info!(
        service = %service.name(),
        interval_ms = policy.interval_millis,
        endpoint = %policy.endpoint,
        "Health monitor starting"
    );

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // A dropped handle counts as a stop request.
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = check_all(&service, &client, &policy) => {}
                }
            }
        }
    }

    tracing::info!(service = %service.name(), "Health monitor stopped");
}

async fn check_all(service: &Service, client: &HttpClient, policy: &HealthCheckPolicy) {
    for upstream in service.upstreams() {
        check_upstream(service.name(), upstream, client, policy).await;
    }
}

async fn check_upstream(service: &str, upstream: &Upstream, client: &HttpClient, policy: &HealthCheckPolicy) {
    let target = upstream.target().as_str();

    match probe(client, &upstream.probe_url(&policy.endpoint), policy).await {
        Ok(()) => {
            tracing::trace!(service, upstream = %target, "Health probe succeeded");
            if upstream.record_probe_success() == HealthTransition::BecameHealthy {
                tracing::info!(service, upstream = %target, "Upstream is healthy again");
            }
        }
        Err(e) => {
            tracing::debug!(service, upstream = %target, error = %e, "Health probe failed");
            metrics::record_probe_failure(target);

            let transition = upstream.record_probe_failure(e.to_string(), policy.failure_threshold);
            if transition == HealthTransition::BecameUnhealthy {
                tracing::warn!(
                    service,
                    upstream = %target,
                    consecutive_fails = upstream.health().consecutive_fails,
                    error = %e,
                    "Upstream marked unhealthy"
                );
            }
        }
    }

    metrics::record_upstream_health(target, upstream.is_healthy());
}

/// Issue one GET against `url`. Any response is a success.
async fn probe(client: &HttpClient, url: &str, policy: &HealthCheckPolicy) -> Result<(), GatewayError> {
    let failure = |reason: String| GatewayError::ProbeFailure {
        target: url.to_string(),
        reason,
    };

    let request = Request::builder()
        .method(Method::GET)
        .uri(url)
        .header(USER_AGENT, PROBE_USER_AGENT)
        .body(Body::empty())
        .map_err(|e| failure(e.to_string()))?;

    match time::timeout(policy.timeout(), client.request(request)).await {
        Ok(Ok(_response)) => Ok(()),
        Ok(Err(e)) => Err(failure(e.to_string())),
        Err(_) => Err(failure(format!("timed out after {}ms", policy.timeout_millis))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::{routing::get, Router};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{HealthCheckConfig, ServerConfig};
    use crate::proxy::forwarder::http_client;

    fn service(upstream: &str, interval: u32, fails: u32) -> Arc<Service> {
        let config = ServerConfig {
            name: "probe-test".to_string(),
            context: "/probe".to_string(),
            upstreams: vec![upstream.to_string()],
            allowed_methods: vec!["GET".to_string()],
            health_check: HealthCheckConfig {
                endpoint: "/health".to_string(),
                interval,
                fails,
                timeout: 500,
            },
        };
        Arc::new(Service::from_config(&config, &http_client()).unwrap())
    }

    async fn dead_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_dead_upstream_becomes_unhealthy() {
        let service = service(&dead_address().await, 20, 2);
        let monitor = HealthMonitor::start(service.clone(), http_client());

        let upstream = service.upstreams()[0].clone();
        assert!(wait_for(|| !upstream.is_healthy()).await);

        let health = upstream.health();
        assert!(health.consecutive_fails >= 2);
        assert!(health.last_error.is_some());

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_probes_hit_configured_endpoint() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/health",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "ok" }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let service = service(&addr.to_string(), 20, 1);
        service.upstreams()[0].record_probe_failure("seeded", 1);
        assert!(!service.upstreams()[0].is_healthy());

        let monitor = HealthMonitor::start(service.clone(), http_client());
        let upstream = service.upstreams()[0].clone();
        assert!(wait_for(|| upstream.is_healthy()).await);
        assert!(hits.load(Ordering::SeqCst) >= 1);
        assert_eq!(upstream.health().consecutive_fails, 0);

        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_stop_ends_task_before_first_tick() {
        let service = service(&dead_address().await, 60_000, 1);
        let monitor = HealthMonitor::start(service.clone(), http_client());
        assert!(!monitor.is_finished());

        time::timeout(Duration::from_secs(1), monitor.stop()).await.unwrap();
        assert_eq!(service.upstreams()[0].health().consecutive_fails, 0);
    }

    #[tokio::test]
    async fn test_stop_abandons_in_flight_round() {
        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(socket);
            }
        });

        let service = service(&addr.to_string(), 20, 1);
        let monitor = HealthMonitor::start(service.clone(), http_client());
        assert!(wait_for(|| accepted.load(Ordering::SeqCst) >= 1).await);

        // The probe timeout is 500ms; stop must not wait for it.
        time::timeout(Duration::from_millis(200), monitor.stop()).await.unwrap();

        let health = service.upstreams()[0].health();
        assert_eq!(health.consecutive_fails, 0);
        assert!(health.healthy);
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_task() {
        let service = service(&dead_address().await, 20, 1);
        let monitor = HealthMonitor::start(service, http_client());
        let HealthMonitor { stop_tx, task, .. } = monitor;
        drop(stop_tx);

        time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_zero_interval_exits_immediately() {
        let service = service(&dead_address().await, 0, 1);
        let monitor = HealthMonitor::start(service, http_client());
        let finished = wait_for(|| monitor.is_finished()).await;
        assert!(finished);
        monitor.stop().await;
    }
}
