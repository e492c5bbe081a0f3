//! Service registry.
//!
//! # Responsibilities
//! - Hold every service by unique name
//! - Reject a second registration under an existing name
//! - Produce the introspection snapshot of all services
//!
//! # Design Decisions
//! - Backed by `DashMap` so concurrent registration needs no outer lock;
//!   the entry API makes "first registration wins" atomic
//! - Services are shared as `Arc<Service>` with routes and monitors

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::ServerConfig;
use crate::error::GatewayError;
use crate::proxy::forwarder::HttpClient;
use crate::proxy::service::{Service, ServiceSnapshot};

#[derive(Debug, Default)]
pub struct Registry {
    services: DashMap<String, Arc<Service>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under its name. The existing entry is kept when
    /// the name is already taken.
    pub fn register(&self, service: Arc<Service>) -> Result<(), GatewayError> {
        match self.services.entry(service.name().to_string()) {
            Entry::Occupied(_) => Err(GatewayError::DuplicateRegistration {
                name: service.name().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(service);
                Ok(())
            }
        }
    }

    /// Build a service from `config` and register it. Nothing is registered
    /// when construction fails.
    pub fn create_service(&self, config: &ServerConfig, client: &HttpClient) -> Result<Arc<Service>, GatewayError> {
        let service = Arc::new(Service::from_config(config, client)?);
        self.register(service.clone())?;

        tracing::info!(
            service = %service.name(),
            context = %service.context(),
            upstreams = service.upstreams().len(),
            "Service registered"
        );
        Ok(service)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Service>> {
        self.services.get(name).map(|entry| entry.value().clone())
    }

    /// All services, ordered by name.
    pub fn services(&self) -> Vec<Arc<Service>> {
        let mut services: Vec<_> = self.services.iter().map(|entry| entry.value().clone()).collect();
        services.sort_by(|a, b| a.name().cmp(b.name()));
        services
    }

    /// Snapshot of every service keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, ServiceSnapshot> {
        self.services()
            .into_iter()
            .map(|service| (service.name().to_string(), service.snapshot()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthCheckConfig;
    use crate::proxy::forwarder::http_client;

    fn config(name: &str, context: &str, upstream: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            context: context.to_string(),
            upstreams: vec![upstream.to_string()],
            allowed_methods: vec!["GET".to_string()],
            health_check: HealthCheckConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = Registry::new();
        let client = http_client();
        registry.create_service(&config("users", "/users", "127.0.0.1:9001"), &client).unwrap();
        registry.create_service(&config("orders", "/orders", "127.0.0.1:9002"), &client).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("users").unwrap().context(), "/users");
        assert!(registry.lookup("missing").is_none());

        let names: Vec<String> = registry.snapshot().into_keys().collect();
        assert_eq!(names, vec!["orders", "users"]);
    }

    #[tokio::test]
    async fn test_duplicate_keeps_first() {
        let registry = Registry::new();
        let client = http_client();
        registry.create_service(&config("users", "/users", "127.0.0.1:9001"), &client).unwrap();

        let err = registry
            .create_service(&config("users", "/people", "127.0.0.1:9009"), &client)
            .unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateRegistration { ref name } if name == "users"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("users").unwrap().context(), "/users");
    }

    #[tokio::test]
    async fn test_invalid_address_is_not_registered() {
        let registry = Registry::new();
        let err = registry
            .create_service(&config("bad", "/bad", "ftp://files"), &http_client())
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidUpstreamAddress { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_registration_has_one_winner() {
        let registry = Arc::new(Registry::new());
        let client = http_client();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                let client = client.clone();
                std::thread::spawn(move || {
                    let upstream = format!("127.0.0.1:{}", 9000 + i);
                    registry.create_service(&config("shared", "/shared", &upstream), &client).is_ok()
                })
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
