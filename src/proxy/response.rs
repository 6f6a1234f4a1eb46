//! Synthetic responses produced by the proxy itself.
//!
//! Bodies name at most the subdomain and the requested path; backend
//! addresses never appear in them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// 403 for requests failing cookie authentication.
pub fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}

/// 504 for round trips that missed their deadline.
pub fn gateway_timeout(subdomain: &str, url: &str) -> Response {
    (
        StatusCode::GATEWAY_TIMEOUT,
        format!("{subdomain} upstream timeout: {url}"),
    )
        .into_response()
}
