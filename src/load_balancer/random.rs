//! Random load balancing strategy.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::load_balancer::{backend::BackendHandle, first_alive_from, LoadBalancer};

/// Random selector.
/// Draws a starting index from a (possibly seeded) generator, then takes the
/// first live backend from there.
#[derive(Debug)]
pub struct RandomDraw {
    rng: Mutex<fastrand::Rng>,
}

impl RandomDraw {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Deterministic selector: equal seeds give equal sequences.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for RandomDraw {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RandomDraw {
    fn next_backend(&self, backends: &[&BackendHandle], now: Instant) -> Option<usize> {
        if backends.is_empty() {
            return None;
        }

        let start = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .usize(..backends.len());
        first_alive_from(start, backends, now)
    }
}
