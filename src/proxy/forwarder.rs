//! Request forwarding.
//!
//! # Responsibilities
//! - Rewrite the inbound request URI onto the upstream target
//! - Strip hop-by-hop headers in both directions
//! - Append the client address to `x-forwarded-for`
//! - Measure round-trip latency and fold it into upstream stats
//!
//! # Design Decisions
//! - One shared hyper-util client for all upstreams (pooled connections)
//! - Latency is recorded for failures too; health is never touched here
//! - No per-request deadline: the transport and the inbound request decide

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use axum::http::{Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::{Position, Url};

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::proxy::upstream::Upstream;

/// Client used for forwarded traffic and health probes.
pub type HttpClient = Client<HttpConnector, Body>;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Build the pooled HTTP/1.1 client shared by the gateway.
pub fn http_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Raw forwarding capability bound to one target.
#[derive(Debug, Clone)]
pub struct Forwarder {
    target: Url,
    client: HttpClient,
}

impl Forwarder {
    pub fn new(target: Url, client: HttpClient) -> Self {
        Self { target, client }
    }

    /// Map an inbound URI onto the target: target authority, target path
    /// joined with the request path, target query followed by request query.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, GatewayError> {
        let mut uri = format!(
            "{}{}",
            &self.target[..Position::BeforePath],
            join_path(self.target.path(), inbound.path())
        );

        match (self.target.query(), inbound.query()) {
            (Some(a), Some(b)) => uri.push_str(&format!("?{a}&{b}")),
            (Some(q), None) | (None, Some(q)) => uri.push_str(&format!("?{q}")),
            (None, None) => {}
        }

        uri.parse::<Uri>().map_err(|e| GatewayError::RequestRewrite {
            target: self.target.to_string(),
            reason: e.to_string(),
        })
    }

    /// Send `request` to the target and hand back the streamed response.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let (mut parts, body) = request.into_parts();

        parts.uri = self.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);

        if let Some(ConnectInfo(client)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, client);
        }

        let response: Response<Incoming> = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|source| GatewayError::Forwarding {
                target: self.target.to_string(),
                source,
            })?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Wraps an upstream's forwarder and records the round-trip latency of every
/// completed forward, successful or not.
pub struct InstrumentedForwarder<'a> {
    upstream: &'a Upstream,
}

impl<'a> InstrumentedForwarder<'a> {
    pub fn new(upstream: &'a Upstream) -> Self {
        Self { upstream }
    }

    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, GatewayError> {
        let start = Instant::now();
        let result = self.upstream.forwarder().forward(request).await;
        let elapsed = start.elapsed();

        let average = self.upstream.record_latency(elapsed);
        let target = self.upstream.target().as_str();
        metrics::record_upstream_latency(target, elapsed);

        tracing::trace!(
            upstream = %target,
            elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
            average_ms = average,
            success = result.is_ok(),
            "Forward completed"
        );

        result
    }
}

/// Join two URL paths with exactly one slash between them.
pub(crate) fn join_path(base: &str, suffix: &str) -> String {
    match (base.ends_with('/'), suffix.starts_with('/')) {
        (true, true) => format!("{}{}", base, &suffix[1..]),
        (false, false) if !suffix.is_empty() => format!("{base}/{suffix}"),
        _ => format!("{base}{suffix}"),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: &SocketAddr) {
    let ip = client.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
