//! Introspection API.
//!
//! # Endpoints
//! - `GET /gateway/info`: application name, version and build commit
//! - `GET /gateway/config`: the loaded configuration
//! - `GET /gateway/inspect`: snapshot of every service
//! - `GET /gateway/inspect/:name`: snapshot of one service, 404 when unknown
//!
//! Service contexts may not live under this prefix.

pub mod handlers;

use std::sync::Arc;

use axum::http::Method;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::{ApiRequest, RouterEngine};
use crate::proxy::Registry;

pub const INTROSPECTION_PREFIX: &str = "/gateway";

/// Bind the introspection endpoints on `engine`.
pub fn mount<E: RouterEngine>(
    engine: &mut E,
    registry: Arc<Registry>,
    config: Arc<GatewayConfig>,
) -> Result<(), GatewayError> {
    engine.handle(
        Method::GET,
        &format!("{INTROSPECTION_PREFIX}/info"),
        Arc::new(handlers::get_info),
    )?;

    engine.handle(
        Method::GET,
        &format!("{INTROSPECTION_PREFIX}/config"),
        Arc::new(move |_: ApiRequest| handlers::get_config(&config)),
    )?;

    let all = registry.clone();
    engine.handle(
        Method::GET,
        &format!("{INTROSPECTION_PREFIX}/inspect"),
        Arc::new(move |_: ApiRequest| handlers::get_services(&all)),
    )?;

    engine.handle(
        Method::GET,
        &format!("{INTROSPECTION_PREFIX}/inspect/:name"),
        Arc::new(move |request: ApiRequest| handlers::get_service(&registry, &request)),
    )?;

    tracing::debug!(prefix = INTROSPECTION_PREFIX, "Introspection API mounted");
    Ok(())
}
