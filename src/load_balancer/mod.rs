//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request matched a service context path
//!     → service.rs hands its upstream list to the balancer
//!     → round_robin.rs (cursor + bounded health-skip scan)
//!     → Selection { index, upstream, fallback }
//!     → forwarder.rs sends the request
//! ```
//!
//! # Design Decisions
//! - One balancer per service; the cursor is the only mutable state
//! - Unhealthy upstreams are skipped, but a fully unhealthy service still
//!   forwards to the upstream at the cursor instead of failing fast
//! - The scan is bounded by the upstream count and never blocks on I/O

pub mod round_robin;

use std::sync::Arc;

use serde::Serialize;

use crate::proxy::upstream::Upstream;

pub use round_robin::RoundRobin;

/// Outcome of one selection.
#[derive(Debug)]
pub struct Selection<'a> {
    /// Position of the chosen upstream.
    pub index: usize,
    pub upstream: &'a Arc<Upstream>,
    /// Upstreams inspected before deciding; never more than the upstream count.
    pub probes: usize,
    /// True when no upstream was healthy and the start position was used anyway.
    pub fallback: bool,
}

/// Balancer state exposed through the introspection API.
#[derive(Debug, Clone, Serialize)]
pub struct BalancerSnapshot {
    pub algorithm: &'static str,
    pub cursor: usize,
}

/// Strategy that picks the upstream for the next request.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick an upstream. Returns `None` only for an empty list.
    fn next_server<'a>(&self, upstreams: &'a [Arc<Upstream>]) -> Option<Selection<'a>>;

    fn snapshot(&self) -> BalancerSnapshot;
}
