//! Introspection handlers.
//!
//! Every handler is synchronous: it only reads the registry or the loaded
//! configuration, taking each upstream lock briefly while snapshotting.

use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::http::{ApiRequest, ApiResponse};
use crate::proxy::Registry;

/// Build identity reported by `/gateway/info`.
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub app: &'static str,
    pub model: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
}

impl AppInfo {
    pub fn current() -> Self {
        Self {
            app: env!("CARGO_PKG_NAME"),
            model: option_env!("GATEWAY_MODEL").unwrap_or("unknown"),
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GATEWAY_COMMIT").unwrap_or("unknown"),
        }
    }
}

// Service snapshots are live state.
const NO_STORE: &str = "no-store";

pub fn get_info(_request: ApiRequest) -> ApiResponse {
    to_response(&AppInfo::current())
}

pub fn get_config(config: &GatewayConfig) -> ApiResponse {
    to_response(config)
}

pub fn get_services(registry: &Registry) -> ApiResponse {
    ApiResponse::ok(json!({ "services": registry.snapshot() })).with_header(CACHE_CONTROL, HeaderValue::from_static(NO_STORE))
}

pub fn get_service(registry: &Registry, request: &ApiRequest) -> ApiResponse {
    let service = request.path_param("name").and_then(|name| registry.lookup(name));

    match service {
        Some(service) => to_response(&service.snapshot()).with_header(CACHE_CONTROL, HeaderValue::from_static(NO_STORE)),
        None => ApiResponse::error(StatusCode::NOT_FOUND, "Service not found."),
    }
}

fn to_response<T: Serialize>(value: &T) -> ApiResponse {
    match serde_json::to_value(value) {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize introspection response");
            ApiResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                headers: HeaderMap::new(),
                body: Value::Null,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::body::Bytes;
    use axum::http::Method;

    use super::*;
    use crate::config::{HealthCheckConfig, ServerConfig};
    use crate::proxy::forwarder::http_client;

    fn request(name: Option<&str>) -> ApiRequest {
        ApiRequest {
            method: Method::GET,
            path: "/gateway/inspect".to_string(),
            path_params: name.map(|n| HashMap::from([("name".to_string(), n.to_string())])).unwrap_or_default(),
            query_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    fn registry() -> Registry {
        let registry = Registry::new();
        let config = ServerConfig {
            name: "users".to_string(),
            context: "/users".to_string(),
            upstreams: vec!["127.0.0.1:9001".to_string()],
            allowed_methods: vec!["GET".to_string()],
            health_check: HealthCheckConfig::default(),
        };
        registry.create_service(&config, &http_client()).unwrap();
        registry
    }

    #[test]
    fn test_info() {
        let response = get_info(request(None));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["app"], "context-gateway");
        assert!(response.body["model"].is_string());
        assert_eq!(response.body["version"], env!("CARGO_PKG_VERSION"));
        assert!(response.body["commit"].is_string());
    }

    #[tokio::test]
    async fn test_inspect_all_and_one() {
        let registry = registry();

        let all = get_services(&registry);
        assert_eq!(all.body["services"]["users"]["context"], "/users");

        assert_eq!(all.headers[CACHE_CONTROL], "no-store");

        let one = get_service(&registry, &request(Some("users")));
        assert_eq!(one.status, StatusCode::OK);
        assert_eq!(one.headers[CACHE_CONTROL], "no-store");
        assert_eq!(one.body["upstreams"][0]["healthStats"]["healthy"], true);
    }

    #[tokio::test]
    async fn test_inspect_unknown_service() {
        let response = get_service(&registry(), &request(Some("ghost")));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, json!({ "message": "Service not found." }));
    }

    #[test]
    fn test_config_is_kebab_case() {
        let response = get_config(&GatewayConfig::default());
        assert_eq!(response.body["port"], 80);
        assert_eq!(response.body["observability"]["log-level"], "info");
    }
}
