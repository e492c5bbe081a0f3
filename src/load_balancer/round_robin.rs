//! Round-robin load balancing with health skip.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::load_balancer::{BalancerSnapshot, LoadBalancer, Selection};
use crate::proxy::upstream::Upstream;

/// Round-robin selector.
/// Holds a cursor to the next candidate position; the whole scan runs under
/// the cursor lock so concurrent selections never commit the same value.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server<'a>(&self, upstreams: &'a [Arc<Upstream>]) -> Option<Selection<'a>> {
        let len = upstreams.len();
        if len == 0 {
            return None;
        }

        let mut cursor = self.lock();
        let start = *cursor % len;

        // Bounded scan: at most `len` probes, then fall back to the start
        // position so a fully unhealthy service still gets an answer.
        let mut index = start;
        let mut probes = 1;
        let mut healthy = upstreams[index].is_healthy();
        while !healthy && probes < len {
            index = (index + 1) % len;
            probes += 1;
            healthy = upstreams[index].is_healthy();
        }

        let fallback = !healthy;
        if fallback {
            index = start;
        }

        *cursor = (index + 1) % len;

        Some(Selection {
            index,
            upstream: &upstreams[index],
            probes,
            fallback,
        })
    }

    fn snapshot(&self) -> BalancerSnapshot {
        BalancerSnapshot {
            algorithm: "round_robin",
            cursor: *self.lock(),
        }
    }
}
