//! Gateway assembly.
//!
//! # Responsibilities
//! - Construct and register one service per configured server block
//! - Bind proxy routes and the introspection API on a router engine
//! - Own the health monitors and stop them on shutdown
//!
//! # Data Flow
//! ```text
//! GatewayConfig
//!     → Registry::create_service (per server block)
//!     → mount: {context, context/, context/*path} × allowed methods → Service::forward
//!     → start_health_monitors: one HealthMonitor per service
//!     → shutdown: stop every monitor and wait for it
//! ```

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::http::{Method, Request};

use crate::admin;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::health::HealthMonitor;
use crate::http::{ProxyFuture, ProxyHandler, RouterEngine};
use crate::proxy::{http_client, HttpClient, Registry, Service};

pub struct Gateway {
    config: Arc<GatewayConfig>,
    registry: Arc<Registry>,
    client: HttpClient,
    monitors: Mutex<Vec<HealthMonitor>>,
}

impl Gateway {
    /// Build every service from `config`. A duplicate service name is
    /// skipped with a warning; an invalid upstream address is fatal.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = http_client();
        let registry = Registry::new();

        for server in &config.servers {
            match registry.create_service(server, &client) {
                Ok(_) => {}
                Err(GatewayError::DuplicateRegistration { name }) => {
                    tracing::warn!(service = %name, "Duplicate service name, keeping the first registration");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            client,
            monitors: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &Arc<GatewayConfig> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        self.registry.services()
    }

    /// Bind the introspection API and every service's proxy routes.
    pub fn mount<E: RouterEngine>(&self, engine: &mut E) -> Result<(), GatewayError> {
        admin::mount(engine, self.registry.clone(), self.config.clone())?;

        for service in self.registry.services() {
            if service.allowed_methods().is_empty() {
                tracing::warn!(service = %service.name(), "No allowed methods, service is unreachable");
            }

            for name in service.allowed_methods() {
                let method = Method::from_bytes(name.as_bytes())
                    .map_err(|_| GatewayError::UnsupportedMethod(name.clone()))?;

                for pattern in service.route_patterns() {
                    engine.proxy_handle(method.clone(), &pattern, proxy_handler(service.clone()))?;
                }
            }

            tracing::info!(
                service = %service.name(),
                context = %service.context(),
                methods = ?service.allowed_methods(),
                "Service mounted"
            );
        }

        Ok(())
    }

    /// Start one health monitor per registered service. Calling this again
    /// while monitors are running does nothing.
    pub fn start_health_monitors(&self) -> usize {
        let mut monitors = self.monitors();
        if !monitors.is_empty() {
            return monitors.len();
        }

        for service in self.registry.services() {
            monitors.push(HealthMonitor::start(service, self.client.clone()));
        }

        tracing::info!(count = monitors.len(), "Health monitors started");
        monitors.len()
    }

    pub fn running_monitors(&self) -> usize {
        self.monitors().iter().filter(|m| !m.is_finished()).count()
    }

    /// Stop every health monitor and wait for its task to end.
    pub async fn shutdown(&self) {
        let monitors = mem::take(&mut *self.monitors());

        for monitor in monitors {
            let service = monitor.service().to_string();
            monitor.stop().await;
            tracing::debug!(service = %service, "Health monitor joined");
        }

        tracing::info!("Gateway stopped");
    }

    fn monitors(&self) -> MutexGuard<'_, Vec<HealthMonitor>> {
        self.monitors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn proxy_handler(service: Arc<Service>) -> ProxyHandler {
    Arc::new(move |request: Request<Body>| -> ProxyFuture {
        let service = service.clone();
        Box::pin(async move { service.forward(request).await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthCheckConfig, ServerConfig};
    use crate::http::AxumEngine;

    fn server(name: &str, context: &str, methods: &[&str]) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            context: context.to_string(),
            upstreams: vec!["127.0.0.1:9001".to_string()],
            allowed_methods: methods.iter().map(|m| m.to_string()).collect(),
            health_check: HealthCheckConfig::default(),
        }
    }

    fn config(servers: Vec<ServerConfig>) -> GatewayConfig {
        GatewayConfig {
            servers,
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_keeps_first() {
        let gateway = Gateway::new(config(vec![
            server("users", "/users", &["GET"]),
            server("users", "/people", &["GET"]),
        ]))
        .unwrap();

        assert_eq!(gateway.services().len(), 1);
        assert_eq!(gateway.registry().lookup("users").unwrap().context(), "/users");
    }

    #[tokio::test]
    async fn test_invalid_upstream_aborts() {
        let mut bad = server("bad", "/bad", &["GET"]);
        bad.upstreams.push("https://secure.local".to_string());
        assert!(Gateway::new(config(vec![bad])).is_err());
    }

    #[tokio::test]
    async fn test_mount_binds_context_and_subtree() {
        let gateway = Gateway::new(config(vec![
            server("users", "/users", &["GET", "POST"]),
            server("root", "/", &["GET"]),
        ]))
        .unwrap();

        let mut engine = AxumEngine::new();
        gateway.mount(&mut engine).unwrap();
        // 4 introspection routes + users (2 methods × 3 patterns) + root (1 × 2)
        assert_eq!(engine.binding_count(), 4 + 6 + 2);
    }

    #[tokio::test]
    async fn test_mount_rejects_unsupported_method() {
        let gateway = Gateway::new(config(vec![server("users", "/users", &["PURGE"])])).unwrap();
        let err = gateway.mount(&mut AxumEngine::new()).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedMethod(ref m) if m == "PURGE"));
    }

    #[tokio::test]
    async fn test_monitors_start_once_and_stop() {
        let gateway = Gateway::new(config(vec![
            server("users", "/users", &["GET"]),
            server("orders", "/orders", &["GET"]),
        ]))
        .unwrap();

        assert_eq!(gateway.start_health_monitors(), 2);
        assert_eq!(gateway.start_health_monitors(), 2);
        assert_eq!(gateway.running_monitors(), 2);

        gateway.shutdown().await;
        assert_eq!(gateway.running_monitors(), 0);
    }
}
