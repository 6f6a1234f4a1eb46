//! Request inspection.
//!
//! # Responsibilities
//! - Generate unique request IDs (UUID v4)
//! - Extract the host a request was addressed to
//! - Derive the subdomain token used as routing key
//!
//! # Design Decisions
//! - The Host header wins over the URI authority
//! - Any `:port` suffix is ignored
//! - Tokens are lowercase; an empty token yields none

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a UUID v4 request ID for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID of a request, if any.
pub fn request_id<B>(req: &Request<B>) -> &str {
    req.headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Host the request was addressed to: Host header, else URI authority.
pub fn request_host(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
}

/// Drop a trailing `:port`, keeping bracketed IPv6 literals intact.
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Routing token of `host`, lowercase.
///
/// A host ending in `.{base_domain}` yields everything before that suffix.
/// The base domain itself yields `None`. Any other host yields its leftmost
/// label.
pub fn subdomain_token(host: &str, base_domain: &str) -> Option<String> {
    let host = strip_port(host).trim_end_matches('.').to_lowercase();
    let base = base_domain.trim_matches('.').to_lowercase();

    let token = if base.is_empty() {
        host.split('.').next()
    } else if host == base {
        None
    } else {
        match host.strip_suffix(base.as_str()).and_then(|rest| rest.strip_suffix('.')) {
            Some(rest) => Some(rest),
            None => host.split('.').next(),
        }
    };

    token.filter(|t| !t.is_empty()).map(str::to_string)
}
