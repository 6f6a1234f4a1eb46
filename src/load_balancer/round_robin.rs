//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::load_balancer::{backend::BackendHandle, first_alive_from, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_backend(&self, backends: &[&BackendHandle], now: Instant) -> Option<usize> {
        if backends.is_empty() {
            return None;
        }

        // Dead handles are skipped; the counter still advances once per call.
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        first_alive_from(start, backends, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::handler::testing::StaticHandler;
    use std::time::Duration;

    #[test]
    fn test_round_robin() {
        let now = Instant::now();
        let ttl = Duration::from_secs(30);
        let b1 = BackendHandle::new_at(StaticHandler::shared("b1"), ttl, now);
        let b2 = BackendHandle::new_at(StaticHandler::shared("b2"), ttl, now);
        let backends = vec![&b1, &b2];
        let lb = RoundRobin::new();

        assert_eq!(lb.next_backend(&backends, now), Some(0));
        assert_eq!(lb.next_backend(&backends, now), Some(1));
        assert_eq!(lb.next_backend(&backends, now), Some(0));
    }

    #[test]
    fn test_skips_dead() {
        let now = Instant::now();
        let dead = BackendHandle::new_at(StaticHandler::shared("dead"), Duration::ZERO, now);
        let live = BackendHandle::new_at(StaticHandler::shared("live"), Duration::from_secs(30), now);
        let backends = vec![&dead, &live];
        let lb = RoundRobin::new();

        for _ in 0..4 {
            assert_eq!(lb.next_backend(&backends, now), Some(1));
        }
    }

    #[test]
    fn test_all_dead() {
        let now = Instant::now();
        let dead = BackendHandle::new_at(StaticHandler::shared("dead"), Duration::ZERO, now);
        let lb = RoundRobin::new();
        assert_eq!(lb.next_backend(&[&dead], now), None);
        assert_eq!(lb.next_backend(&[], now), None);
    }

    #[test]
    fn test_counter_wraps_around() {
        let now = Instant::now();
        let ttl = Duration::from_secs(30);
        let dead = BackendHandle::new_at(StaticHandler::shared("dead"), Duration::ZERO, now);
        let b1 = BackendHandle::new_at(StaticHandler::shared("b1"), ttl, now);
        let b2 = BackendHandle::new_at(StaticHandler::shared("b2"), ttl, now);
        let backends = vec![&b1, &dead, &b2];
        let lb = RoundRobin {
            counter: AtomicUsize::new(usize::MAX - 1),
        };

        // usize::MAX - 1 and usize::MAX land on index 2 and 0, then 0 again.
        assert_eq!(lb.next_backend(&backends, now), Some(2));
        assert_eq!(lb.next_backend(&backends, now), Some(0));
        assert_eq!(lb.next_backend(&backends, now), Some(0));
    }
}
