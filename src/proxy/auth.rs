//! Cookie authentication.
//!
//! The proxy only locates the named cookie and asks a validator about it;
//! what a valid credential looks like is up to the validator.

use axum::http::{header, HeaderMap};
use thiserror::Error;

/// Why a request was not authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("cookie {0:?} not present")]
    MissingCookie(String),
    #[error("credential rejected: {0}")]
    Rejected(String),
}

/// Decides whether a cookie value is an acceptable credential.
pub trait CookieValidator: Send + Sync {
    fn validate(&self, value: &str) -> Result<(), AuthError>;
}

impl<F> CookieValidator for F
where
    F: Fn(&str) -> Result<(), AuthError> + Send + Sync,
{
    fn validate(&self, value: &str) -> Result<(), AuthError> {
        self(value)
    }
}

/// Accepts exactly one shared secret.
pub struct SharedSecretValidator {
    secret: String,
}

impl SharedSecretValidator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl CookieValidator for SharedSecretValidator {
    fn validate(&self, value: &str) -> Result<(), AuthError> {
        if constant_time_eq(value, &self.secret) {
            Ok(())
        } else {
            Err(AuthError::Rejected("secret mismatch".to_string()))
        }
    }
}

/// Compare two credentials, visiting every byte so timing does not leak
/// the length of the matching prefix.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.iter()
        .zip(b)
        .fold(a.len() ^ b.len(), |acc, (x, y)| acc | usize::from(x ^ y))
        == 0
}

/// Value of the cookie called `name`, searching every `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            let value = value.trim();
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
        })
}
