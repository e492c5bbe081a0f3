//! Router engine capability and its Axum implementation.
//!
//! # Responsibilities
//! - Bind JSON API handlers and raw proxy handlers to method + pattern
//! - Reject duplicate bindings and methods the engine cannot dispatch
//! - Wire up middleware (tracing, request ID) and serve until shutdown
//!
//! # Design Decisions
//! - The proxy core only sees `RouterEngine`; Axum stays behind this seam
//! - Patterns use `:name` for one segment and `*name` for the remainder
//! - Routes are collected first and turned into an Axum `Router` in `run`

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Query, RawPathParams};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::error::GatewayError;
use crate::http::request::{request_span, MakeGatewayRequestId};

/// Parsed request handed to JSON API handlers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }
}

/// JSON response produced by an API handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: json!({ "message": message }),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.headers, Json(self.body)).into_response()
    }
}

pub type ApiHandler = Arc<dyn Fn(ApiRequest) -> ApiResponse + Send + Sync>;
pub type ProxyFuture = Pin<Box<dyn Future<Output = Response<Body>> + Send>>;
pub type ProxyHandler = Arc<dyn Fn(Request<Body>) -> ProxyFuture + Send + Sync>;

/// HTTP engine the gateway binds its handlers to.
pub trait RouterEngine {
    /// Bind a JSON API handler.
    fn handle(&mut self, method: Method, pattern: &str, handler: ApiHandler) -> Result<(), GatewayError>;

    /// Bind a handler that receives the raw request and streams the raw response.
    fn proxy_handle(&mut self, method: Method, pattern: &str, handler: ProxyHandler) -> Result<(), GatewayError>;

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> impl Future<Output = io::Result<()>> + Send;
}

/// Axum-backed engine.
#[derive(Default)]
pub struct AxumEngine {
    routes: BTreeMap<String, MethodRouter>,
    bound: HashSet<(String, Method)>,
}

impl AxumEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (method, pattern) bindings.
    pub fn binding_count(&self) -> usize {
        self.bound.len()
    }

    /// Build the Axum router with all middleware layers.
    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        for (path, method_router) in self.routes {
            router = router.route(&path, method_router);
        }

        router.fallback(not_found).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeGatewayRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    fn bind<H, T>(&mut self, method: Method, pattern: &str, handler: H) -> Result<(), GatewayError>
    where
        H: axum::handler::Handler<T, ()>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| GatewayError::UnsupportedMethod(method.to_string()))?;
        let path = translate_pattern(pattern)?;

        if !self.bound.insert((path.clone(), method.clone())) {
            return Err(GatewayError::DuplicateRoute {
                method,
                pattern: pattern.to_string(),
            });
        }

        let method_router = match self.routes.remove(&path) {
            Some(existing) => existing.on(filter, handler),
            None => axum::routing::on(filter, handler),
        };
        self.routes.insert(path, method_router);

        tracing::debug!(%method, pattern, "Route bound");
        Ok(())
    }
}

impl RouterEngine for AxumEngine {
    fn handle(&mut self, method: Method, pattern: &str, handler: ApiHandler) -> Result<(), GatewayError> {
        let api = move |method: Method, uri: Uri, headers: HeaderMap, params: RawPathParams, body: Bytes| {
            let handler = handler.clone();
            async move {
                let query_params = Query::<HashMap<String, String>>::try_from_uri(&uri)
                    .map(|Query(query)| query)
                    .unwrap_or_default();
                let request = ApiRequest {
                    method,
                    path: uri.path().to_string(),
                    path_params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                    query_params,
                    headers,
                    body,
                };
                handler(request)
            }
        };
        self.bind(method, pattern, api)
    }

    fn proxy_handle(&mut self, method: Method, pattern: &str, handler: ProxyHandler) -> Result<(), GatewayError> {
        let proxy = move |request: Request<Body>| handler(request);
        self.bind(method, pattern, proxy)
    }

    async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.binding_count(), "HTTP server starting");

        let app = self.into_router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn not_found() -> ApiResponse {
    ApiResponse::error(StatusCode::NOT_FOUND, "Not found.")
}

/// Turn a `:name` / `*name` pattern into Axum's `{name}` / `{*name}` syntax.
pub fn translate_pattern(pattern: &str) -> Result<String, GatewayError> {
    let invalid = |reason: &str| GatewayError::InvalidRoutePattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with `/`"));
    }
    if pattern == "/" {
        return Ok(pattern.to_string());
    }

    let segments: Vec<&str> = pattern[1..].split('/').collect();
    let last = segments.len() - 1;
    let mut path = String::with_capacity(pattern.len() + 4);

    for (i, segment) in segments.iter().enumerate() {
        path.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("empty parameter name"));
            }
            path.push_str(&format!("{{{name}}}"));
        } else if let Some(name) = segment.strip_prefix('*') {
            if name.is_empty() {
                return Err(invalid("empty wildcard name"));
            }
            if i != last {
                return Err(invalid("wildcard must be the last segment"));
            }
            path.push_str(&format!("{{*{name}}}"));
        } else {
            path.push_str(&segment.replace('{', "{{").replace('}', "}}"));
        }
    }

    Ok(path)
}
