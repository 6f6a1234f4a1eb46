//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Registry chosen by the domain router
//!     → pool.rs (handles registered for the port, in address order)
//!     → Apply the selection policy:
//!         - round_robin.rs (rotate through backends)
//!         - random.rs (seeded random starting point)
//!     → backend.rs (skip handles whose deadline has passed)
//!     → Return handler, plus how many dead handles were seen
//! ```
//!
//! # Design Decisions
//! - Selection never mutates the handle map; eviction is a separate,
//!   exclusive operation
//! - Policy state (counter, rng) is safe to use under shared access
//! - Dead backends are skipped, not selected

pub mod backend;
pub mod pool;
pub mod random;
pub mod round_robin;

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::load_balancer::backend::BackendHandle;
use crate::load_balancer::random::RandomDraw;
use crate::load_balancer::round_robin::RoundRobin;

pub use backend::{DEFAULT_TTL, MAX_TTL};
pub use pool::{BackendRegistry, Lookup};

/// Strategy picking one live backend among the candidates.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Index of the selected live backend, or `None` if none is alive at `now`.
    fn next_backend(&self, backends: &[&BackendHandle], now: Instant) -> Option<usize>;
}

/// Named selection policy, chosen by configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    RoundRobin,
    Random,
}

impl SelectionPolicy {
    /// Build a fresh balancer implementing this policy.
    pub fn build(self, seed: Option<u64>) -> Box<dyn LoadBalancer> {
        match self {
            SelectionPolicy::RoundRobin => Box::new(RoundRobin::new()),
            SelectionPolicy::Random => Box::new(match seed {
                Some(seed) => RandomDraw::with_seed(seed),
                None => RandomDraw::new(),
            }),
        }
    }
}

/// Scan from `start`, wrapping around, for the first live backend.
pub(crate) fn first_alive_from(
    start: usize,
    backends: &[&BackendHandle],
    now: Instant,
) -> Option<usize> {
    let len = backends.len();
    if len == 0 {
        return None;
    }
    // Reduce first so a wrapped-around counter cannot overflow the sum.
    let start = start % len;
    (0..len)
        .map(|i| (start + i) % len)
        .find(|&index| backends[index].alive_at(now))
}
