//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::SelectionPolicy;

/// Root configuration for the feature proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where routed traffic goes and which port key the registry uses.
    pub origin: OriginConfig,

    /// Cookie authentication and feature header.
    pub auth: AuthConfig,

    /// Outbound round trip settings.
    pub upstream: UpstreamConfig,

    /// Backend registry settings (TTL, selection policy).
    pub registry: RegistryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:18080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:18080".to_string(),
        }
    }
}

/// Origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Scheme used for outbound requests to registered backends.
    pub scheme: String,

    /// Base domain stripped from the Host header to find the subdomain.
    pub base_domain: String,

    /// Port key used when resolving backends for inbound traffic.
    pub port: u16,

    /// Subdomain used when the request names none or an unknown one.
    pub default_subdomain: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            base_domain: String::new(),
            port: 443,
            default_subdomain: String::new(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Name of the cookie carrying the credential.
    pub cookie_name: String,

    /// Header that selects a feature subdomain explicitly.
    pub feature_header: String,

    /// Shared secret the cookie must carry. Unset disables authentication.
    pub cookie_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "feature-proxy-auth".to_string(),
            feature_header: "X-Feature".to_string(),
            cookie_secret: None,
        }
    }
}

/// Outbound request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Per-request deadline in milliseconds. 0 disables the deadline.
    pub timeout_ms: u64,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Backend registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Lifetime of a registration without renewal, in seconds.
    pub ttl_secs: u64,

    /// How a backend is picked among the live ones.
    pub selection: SelectionPolicy,

    /// Seed for the random selection policy.
    pub seed: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            selection: SelectionPolicy::RoundRobin,
            seed: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Default `EnvFilter` directives, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address of the Prometheus scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            log_filter: "feature_proxy=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// Bearer key required by the admin routes.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
        }
    }
}
