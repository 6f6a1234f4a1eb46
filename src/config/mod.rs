//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → passed by reference to the router, transport and server
//! ```
//!
//! # Design Decisions
//! - Config is built once at startup; there is no global instance
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, ListenerConfig, LogFormat, ObservabilityConfig, OriginConfig,
    ProxyConfig, RegistryConfig, UpstreamConfig,
};
pub use validation::ValidationError;
