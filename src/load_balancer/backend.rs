//! Backend handle abstraction.
//!
//! # Responsibilities
//! - Represent a single registered backend instance
//! - Track its liveness deadline
//!
//! # Design Decisions
//! - Liveness is a stored deadline compared against the clock at use time
//! - No timer task and no callback: an unobserved expiry costs nothing
//! - Only an explicit renewal moves the deadline; traffic never does

use std::time::{Duration, Instant};

use crate::proxy::handler::SharedHandler;

/// Lifetime of a registration when the configuration does not say otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Longest lifetime a registration may be configured with.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// A single registered backend: its forwarding handler plus a deadline.
#[derive(Debug, Clone)]
pub struct BackendHandle {
    handler: SharedHandler,
    deadline: Instant,
    ttl: Duration,
}

impl BackendHandle {
    /// Create a handle that stays alive for `ttl` from now.
    pub fn new(handler: SharedHandler, ttl: Duration) -> Self {
        Self::new_at(handler, ttl, Instant::now())
    }

    /// Create a handle that stays alive for `ttl` from `now`.
    pub fn new_at(handler: SharedHandler, ttl: Duration, now: Instant) -> Self {
        Self {
            handler,
            deadline: deadline_after(now, ttl),
            ttl,
        }
    }

    /// The forwarding handler of this backend.
    pub fn handler(&self) -> &SharedHandler {
        &self.handler
    }

    /// Point in time after which the handle is dead.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Return true if the deadline has not passed yet.
    pub fn alive(&self) -> bool {
        self.alive_at(Instant::now())
    }

    /// Return true if the deadline is after `now`.
    pub fn alive_at(&self, now: Instant) -> bool {
        now < self.deadline
    }

    /// Push the deadline to a full TTL from now.
    pub fn renew(&mut self) {
        self.renew_at(Instant::now());
    }

    /// Push the deadline to a full TTL from `now`.
    pub fn renew_at(&mut self, now: Instant) {
        self.deadline = deadline_after(now, self.ttl);
    }
}

/// `now + ttl`, saturating at [`MAX_TTL`] from `now` when the sum would
/// not fit in an `Instant`.
fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(MAX_TTL))
        .unwrap_or(now)
}
