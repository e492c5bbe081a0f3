//! Proxy core: services, upstreams and request forwarding.
//!
//! # Data Flow
//! ```text
//! Route bound for a service context
//!     → service.rs (balancer picks an upstream)
//!     → forwarder.rs (rewrite URI, strip hop-by-hop headers, send)
//!     → upstream.rs (latency folded into stats)
//!     → response streamed back to the client
//! ```
//!
//! # Design Decisions
//! - The registry is built once at startup and only read afterwards
//! - Upstream state is per-upstream; no lock spans two upstreams

pub mod forwarder;
pub mod registry;
pub mod service;
pub mod upstream;

pub use forwarder::{http_client, Forwarder, HttpClient, InstrumentedForwarder};
pub use registry::Registry;
pub use service::{HealthCheckPolicy, Service, ServiceSnapshot};
pub use upstream::{Upstream, UpstreamSnapshot, UpstreamStats};
