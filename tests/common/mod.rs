//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::Router;
use context_gateway::config::{HealthCheckConfig, ServerConfig};
use context_gateway::{AxumEngine, Gateway, GatewayConfig, RouterEngine, Shutdown};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a backend that answers every request with `"{name} {path?query}"`
/// and echoes the `x-forwarded-for` it received as `x-seen-forwarded-for`.
pub async fn start_named_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    serve_named_backend(listener, name);
    addr
}

/// Same as [`start_named_backend`] on an address chosen by the caller.
pub async fn start_named_backend_at(addr: SocketAddr, name: &'static str) {
    let listener = TcpListener::bind(addr).await.unwrap();
    serve_named_backend(listener, name);
}

fn serve_named_backend(listener: TcpListener, name: &'static str) {
    let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap| async move {
        let mut response_headers = HeaderMap::new();
        if let Some(value) = headers.get("x-forwarded-for") {
            response_headers.insert("x-seen-forwarded-for", value.clone());
        }
        if let Some(value) = headers.get("x-request-id") {
            response_headers.insert("x-seen-request-id", value.clone());
        }
        response_headers.insert("x-backend", HeaderValue::from_static(name));

        let target = uri.path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_default();
        (response_headers, format!("{name} {target}"))
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

/// Start a programmable raw HTTP/1.1 backend.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// HTTP client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn server(name: &str, context: &str, upstreams: &[SocketAddr], methods: &[&str]) -> ServerConfig {
    ServerConfig {
        name: name.to_string(),
        context: context.to_string(),
        upstreams: upstreams.iter().map(|addr| format!("http://{addr}")).collect(),
        allowed_methods: methods.iter().map(|m| m.to_string()).collect(),
        health_check: HealthCheckConfig {
            endpoint: "/health".to_string(),
            interval: 50,
            fails: 2,
            timeout: 200,
        },
    }
}

/// A gateway serving on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Arc<Gateway>,
    shutdown: Shutdown,
    server: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop serving, then stop the health monitors.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.server.await.unwrap().unwrap();
        self.gateway.shutdown().await;
    }
}

pub async fn start_gateway(servers: Vec<ServerConfig>, monitors: bool) -> TestGateway {
    let config = GatewayConfig {
        servers,
        ..GatewayConfig::default()
    };
    let gateway = Arc::new(Gateway::new(config).unwrap());

    let mut engine = AxumEngine::new();
    gateway.mount(&mut engine).unwrap();
    if monitors {
        gateway.start_health_monitors();
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = tokio::spawn(engine.run(listener, shutdown.subscribe()));

    TestGateway {
        addr,
        gateway,
        shutdown,
        server,
    }
}

/// Poll `condition` every 10ms for up to five seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
