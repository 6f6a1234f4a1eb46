//! Feature-branch preview proxy.
//!
//! Routes inbound HTTP requests to dynamically registered backends keyed by
//! subdomain (exact names or glob patterns) and port. Backends register
//! through control events and expire unless renewed.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::FeatureProxy;
pub use routing::{ControlEvent, ControlOutcome, DomainRouter};
