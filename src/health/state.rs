//! Upstream health state machine.
//!
//! # States
//! - Healthy: upstream is preferred by the balancer
//! - Unhealthy: upstream is skipped unless every upstream is unhealthy
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failed probes reach the failure threshold
//! Unhealthy → Healthy: the next successful probe (single sample, no hysteresis)
//! ```
//!
//! Any successful probe resets the failure counter to zero.

use serde::Serialize;

/// Health fields of one upstream. Always read and written as a unit under
/// the owning upstream's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamHealth {
    pub healthy: bool,
    pub consecutive_fails: u32,
    #[serde(rename = "error")]
    pub last_error: Option<String>,
}

/// What a probe result did to the health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    Unchanged,
    BecameHealthy,
    BecameUnhealthy,
}

impl Default for UpstreamHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_fails: 0,
            last_error: None,
        }
    }
}

impl UpstreamHealth {
    /// Apply a successful probe.
    pub fn record_success(&mut self) -> HealthTransition {
        let was_healthy = self.healthy;

        self.healthy = true;
        self.consecutive_fails = 0;
        self.last_error = None;

        if was_healthy {
            HealthTransition::Unchanged
        } else {
            HealthTransition::BecameHealthy
        }
    }

    /// Apply a failed probe. The upstream flips to unhealthy once the
    /// failure count reaches `threshold`; later failures keep counting.
    pub fn record_failure(&mut self, error: impl Into<String>, threshold: u32) -> HealthTransition {
        self.consecutive_fails = self.consecutive_fails.saturating_add(1);
        self.last_error = Some(error.into());

        if self.healthy && self.consecutive_fails >= threshold {
            self.healthy = false;
            HealthTransition::BecameUnhealthy
        } else {
            HealthTransition::Unchanged
        }
    }
}
