//! Configuration loading from disk and the environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the configuration used at startup.
///
/// Starts from the file when one is given (defaults otherwise), applies
/// environment overrides and validates the result.
pub fn load(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the environment variables understood by the proxy.
///
/// `lookup` returns the value of a variable, if set.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("PORT") {
        let port = parse_port("PORT", &value)?;
        let mut addr: SocketAddr =
            config
                .listener
                .bind_address
                .parse()
                .map_err(|_| ConfigError::Env {
                    key: "PORT",
                    value: config.listener.bind_address.clone(),
                })?;
        addr.set_port(port);
        config.listener.bind_address = addr.to_string();
    }
    if let Some(value) = lookup("ORIGIN_PORT") {
        config.origin.port = parse_port("ORIGIN_PORT", &value)?;
    }
    if let Some(value) = lookup("ORIGIN_SCHEME") {
        config.origin.scheme = value;
    }
    if let Some(value) = lookup("ORIGIN_BASE_DOMAIN") {
        config.origin.base_domain = value;
    }
    if let Some(value) = lookup("DEFAULT_SUB_DOMAIN") {
        config.origin.default_subdomain = value;
    }
    if let Some(value) = lookup("FEATURE_HEADER") {
        config.auth.feature_header = value;
    }
    if let Some(value) = lookup("AUTH_COOKIE_SECRET") {
        config.auth.cookie_secret = Some(value).filter(|s| !s.is_empty());
    }
    if let Some(value) = lookup("ADMIN_API_KEY") {
        config.admin.api_key = value;
    }
    Ok(())
}

fn parse_port(key: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_string(),
    })
}
