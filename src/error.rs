//! Error taxonomy for the gateway core.
//!
//! # Propagation
//! - Construction errors (`InvalidUpstreamAddress`) are fatal and stop startup
//! - `DuplicateRegistration` is reported to the caller, who logs and moves on
//! - `ProbeFailure` never leaves the health monitor; it is folded into upstream state
//! - `Forwarding` becomes a 502 for the client and does not touch health state

use axum::http::Method;

/// Errors raised by the traffic-routing and health-management engine.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A configured backend address could not be turned into a forwarding target.
    #[error("invalid upstream address `{address}`: {reason}")]
    InvalidUpstreamAddress { address: String, reason: String },

    /// A service with this name is already registered; the first one is kept.
    #[error("service `{name}` is already registered")]
    DuplicateRegistration { name: String },

    /// Transport-level failure while probing an upstream.
    #[error("health probe to {target} failed: {reason}")]
    ProbeFailure { target: String, reason: String },

    /// The chosen upstream could not be reached for a forwarded request.
    #[error("forwarding to {target} failed: {source}")]
    Forwarding {
        target: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The inbound request could not be mapped onto the upstream target.
    #[error("cannot rewrite request for {target}: {reason}")]
    RequestRewrite { target: String, reason: String },

    /// The same method was bound twice on one route pattern.
    #[error("route {method} {pattern} is already bound")]
    DuplicateRoute { method: Method, pattern: String },

    /// A route pattern the router engine cannot bind.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidRoutePattern { pattern: String, reason: String },

    /// The router engine has no way to dispatch this method.
    #[error("method `{0}` is not supported by the router engine")]
    UnsupportedMethod(String),
}

impl GatewayError {
    pub(crate) fn invalid_address(address: &str, reason: impl ToString) -> Self {
        Self::InvalidUpstreamAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}
