//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Uniqueness of service names and context paths
//! - Value ranges (interval, fails and timeout > 0)
//! - Allowed methods are real HTTP method tokens
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Upstream addresses are parsed by service construction, not here

use std::collections::HashSet;

use axum::http::Method;

use crate::admin::INTROSPECTION_PREFIX;
use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("servers[{index}]: name must not be empty")]
    EmptyName { index: usize },

    #[error("service `{name}` is defined more than once")]
    DuplicateName { name: String },

    #[error("service `{name}`: context `{context}` must start with '/'")]
    RelativeContext { name: String, context: String },

    #[error("service `{name}`: context `{context}` is already used by another service")]
    DuplicateContext { name: String, context: String },

    #[error("service `{name}`: context `{context}` collides with the reserved /gateway prefix")]
    ReservedContext { name: String, context: String },

    #[error("service `{name}`: at least one upstream is required")]
    NoUpstreams { name: String },

    #[error("service `{name}`: `{method}` is not a valid HTTP method")]
    InvalidMethod { name: String, method: String },

    #[error("service `{name}`: method `{method}` is listed twice")]
    DuplicateMethod { name: String, method: String },

    #[error("service `{name}`: health-check.{field} must be greater than zero")]
    ZeroHealthSetting { name: String, field: &'static str },
}

/// Validate a normalized configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut contexts = HashSet::new();

    for (index, server) in config.servers.iter().enumerate() {
        let name = server.name.clone();

        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
        } else if !names.insert(name.clone()) {
            errors.push(ValidationError::DuplicateName { name: name.clone() });
        }

        let context = server.context.clone();
        if !context.starts_with('/') {
            errors.push(ValidationError::RelativeContext {
                name: name.clone(),
                context: context.clone(),
            });
        } else if is_reserved(&context) {
            errors.push(ValidationError::ReservedContext {
                name: name.clone(),
                context: context.clone(),
            });
        }
        if !contexts.insert(context.clone()) {
            errors.push(ValidationError::DuplicateContext {
                name: name.clone(),
                context,
            });
        }

        if server.upstreams.is_empty() {
            errors.push(ValidationError::NoUpstreams { name: name.clone() });
        }

        let mut methods = HashSet::new();
        for method in &server.allowed_methods {
            let upper = method.to_ascii_uppercase();
            if Method::from_bytes(upper.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    name: name.clone(),
                    method: method.clone(),
                });
            } else if !methods.insert(upper.clone()) {
                errors.push(ValidationError::DuplicateMethod {
                    name: name.clone(),
                    method: upper,
                });
            }
        }

        let health = &server.health_check;
        for (field, value) in [
            ("interval", health.interval),
            ("fails", health.fails),
            ("timeout", health.timeout),
        ] {
            if value == 0 {
                errors.push(ValidationError::ZeroHealthSetting {
                    name: name.clone(),
                    field,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_reserved(context: &str) -> bool {
    context == INTROSPECTION_PREFIX
        || context
            .strip_prefix(INTROSPECTION_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
}
