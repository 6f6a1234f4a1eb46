//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, port)
//!     → router.rs (derive subdomain token, lookup)
//!         - exact registry match first
//!         - else first matching pattern, in registration order (matcher.rs)
//!     → backend registry for the pattern (load_balancer)
//!     → Return: live handler or not-found
//!
//! Control events (control.rs):
//!     Add / Remove
//!     → router.rs under exclusive access
//! ```
//!
//! # Design Decisions
//! - Registration order decides between overlapping wildcards, not specificity
//! - No fallback to a later pattern once a registry is chosen
//! - Shared-read lookups; every mutation (including eviction) is exclusive

pub mod control;
pub mod matcher;
pub mod router;

use thiserror::Error;

pub use control::{ControlAction, ControlEvent, ControlOutcome, HandlerFactory};
pub use matcher::SubdomainPattern;
pub use router::DomainRouter;

/// Errors raised while registering backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("invalid subdomain pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
    #[error("invalid backend address {address:?}: {reason}")]
    InvalidBackend { address: String, reason: String },
}
