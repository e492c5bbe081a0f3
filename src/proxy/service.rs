//! Service: a named group of interchangeable upstreams behind one context path.
//!
//! # Responsibilities
//! - Build upstreams from a server block of the configuration
//! - Select an upstream per request through the service's balancer
//! - Forward the request and map failures to gateway responses
//! - Produce the introspection snapshot
//!
//! # Design Decisions
//! - Upstream list and health policy are fixed after construction
//! - The balancer and each upstream guard their own mutable state
//! - Forwarding failures answer 502 and leave health to the monitor

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::config::loader::normalize_context;
use crate::config::{HealthCheckConfig, ServerConfig};
use crate::error::GatewayError;
use crate::load_balancer::{BalancerSnapshot, LoadBalancer, RoundRobin, Selection};
use crate::observability::metrics;
use crate::proxy::forwarder::{HttpClient, InstrumentedForwarder};
use crate::proxy::upstream::{Upstream, UpstreamSnapshot};

/// Probe settings applied to every upstream of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckPolicy {
    pub endpoint: String,
    pub interval_millis: u32,
    pub failure_threshold: u32,
    pub timeout_millis: u32,
}

impl HealthCheckPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.interval_millis))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_millis))
    }
}

impl From<&HealthCheckConfig> for HealthCheckPolicy {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            interval_millis: config.interval,
            failure_threshold: config.fails,
            timeout_millis: config.timeout,
        }
    }
}

/// Introspection view of a service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub name: String,
    pub context: String,
    pub allowed_methods: Vec<String>,
    pub upstreams: Vec<UpstreamSnapshot>,
    pub health_check_info: HealthCheckPolicy,
    pub balancer_info: BalancerSnapshot,
}

#[derive(Debug)]
pub struct Service {
    name: String,
    context: String,
    allowed_methods: Vec<String>,
    upstreams: Vec<Arc<Upstream>>,
    health_policy: HealthCheckPolicy,
    balancer: Box<dyn LoadBalancer>,
}

impl Service {
    /// Build a service and its upstreams. Fails on the first upstream
    /// address that cannot be parsed.
    pub fn from_config(config: &ServerConfig, client: &HttpClient) -> Result<Self, GatewayError> {
        let upstreams = config
            .upstreams
            .iter()
            .map(|address| Upstream::new(address, client.clone()).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: config.name.clone(),
            context: normalize_context(&config.context),
            allowed_methods: config
                .allowed_methods
                .iter()
                .map(|method| method.to_ascii_uppercase())
                .collect(),
            upstreams,
            health_policy: HealthCheckPolicy::from(&config.health_check),
            balancer: Box::new(RoundRobin::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn allowed_methods(&self) -> &[String] {
        &self.allowed_methods
    }

    pub fn upstreams(&self) -> &[Arc<Upstream>] {
        &self.upstreams
    }

    pub fn health_policy(&self) -> &HealthCheckPolicy {
        &self.health_policy
    }

    /// Route patterns served by this service: the context itself and
    /// everything below it. A `*path` wildcard never matches an empty tail,
    /// so `{context}/` is bound on its own.
    pub fn route_patterns(&self) -> Vec<String> {
        if self.context == "/" {
            return vec!["/".to_string(), "/*path".to_string()];
        }
        vec![
            self.context.clone(),
            format!("{}/", self.context),
            format!("{}/*path", self.context),
        ]
    }

    /// Pick the upstream for the next request.
    pub fn select_upstream(&self) -> Option<Selection<'_>> {
        let selection = self.balancer.next_server(&self.upstreams)?;
        if selection.fallback {
            tracing::warn!(
                service = %self.name,
                upstream = %selection.upstream.target(),
                "No healthy upstream, forwarding to cursor position"
            );
        }
        Some(selection)
    }

    /// Forward `request` to the selected upstream and return its response,
    /// or a gateway error response when no upstream could answer.
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let Some(selection) = self.select_upstream() else {
            tracing::warn!(service = %self.name, "Service has no upstreams");
            metrics::record_request(&self.name, StatusCode::SERVICE_UNAVAILABLE.as_u16());
            return (StatusCode::SERVICE_UNAVAILABLE, "No upstreams available").into_response();
        };
        let upstream = selection.upstream;

        tracing::debug!(
            service = %self.name,
            method = %request.method(),
            path = %request.uri().path(),
            upstream = %upstream.target(),
            "Proxying request"
        );

        match InstrumentedForwarder::new(upstream).forward(request).await {
            Ok(response) => {
                metrics::record_request(&self.name, response.status().as_u16());
                response
            }
            Err(e) => {
                tracing::error!(
                    service = %self.name,
                    upstream = %upstream.target(),
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(&self.name, StatusCode::BAD_GATEWAY.as_u16());
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            name: self.name.clone(),
            context: self.context.clone(),
            allowed_methods: self.allowed_methods.clone(),
            upstreams: self.upstreams.iter().map(|u| u.snapshot()).collect(),
            health_check_info: self.health_policy.clone(),
            balancer_info: self.balancer.snapshot(),
        }
    }
}
