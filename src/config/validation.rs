//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ttl within bounds, ports valid)
//! - Validate names used on the wire (cookie, header)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::MAX_TTL;
use crate::routing::matcher::SubdomainPattern;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),
    #[error("origin.scheme {0:?} is not supported (only \"http\")")]
    Scheme(String),
    #[error("origin.port must be non-zero")]
    OriginPort,
    #[error("origin.base_domain {0:?} must be a bare domain")]
    BaseDomain(String),
    #[error("origin.default_subdomain {0:?} is not a valid subdomain pattern")]
    DefaultSubdomain(String),
    #[error("auth.cookie_name {0:?} is not a valid cookie name")]
    CookieName(String),
    #[error("auth.feature_header {0:?} is not a valid header name")]
    FeatureHeader(String),
    #[error("registry.ttl_secs must be between 1 and {}", MAX_TTL.as_secs())]
    Ttl,
    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
    #[error("admin.api_key must be set when the admin API is enabled")]
    AdminKey,
}

/// Check the configuration and collect every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let origin = &config.origin;
    if !origin.scheme.eq_ignore_ascii_case("http") {
        errors.push(ValidationError::Scheme(origin.scheme.clone()));
    }
    if origin.port == 0 {
        errors.push(ValidationError::OriginPort);
    }
    if origin.base_domain.contains(['/', ':', ' ']) {
        errors.push(ValidationError::BaseDomain(origin.base_domain.clone()));
    }
    if !origin.default_subdomain.is_empty()
        && SubdomainPattern::new(&origin.default_subdomain).is_err()
    {
        errors.push(ValidationError::DefaultSubdomain(origin.default_subdomain.clone()));
    }

    if !is_token(&config.auth.cookie_name) {
        errors.push(ValidationError::CookieName(config.auth.cookie_name.clone()));
    }
    if HeaderName::from_bytes(config.auth.feature_header.as_bytes()).is_err() {
        errors.push(ValidationError::FeatureHeader(config.auth.feature_header.clone()));
    }

    if config.registry.ttl_secs == 0 || config.registry.ttl_secs > MAX_TTL.as_secs() {
        errors.push(ValidationError::Ttl);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::AdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// RFC 7230 `token`.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}
