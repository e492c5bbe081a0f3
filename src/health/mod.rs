//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (monitor.rs):
//!     Periodic timer per service
//!     → Probe each upstream (target + endpoint)
//!     → Update state.rs under the upstream lock
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     Threshold on the way down, single success on the way up
//! ```
//!
//! # Design Decisions
//! - Health is only changed by probes, never by forwarded traffic
//! - Health state is per-upstream, not per-service

pub mod monitor;
pub mod state;

pub use monitor::HealthMonitor;
pub use state::{HealthTransition, UpstreamHealth};
