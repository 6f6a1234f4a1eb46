//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → /proxy/healthz, /proxy/admin/* answered locally
//!     → everything else: request.rs derives host and subdomain token
//!     → proxy::FeatureProxy routes to a live backend
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
