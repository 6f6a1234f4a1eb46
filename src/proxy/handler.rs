//! Forwarding handlers stored in backend handles.
//!
//! # Responsibilities
//! - Define the handler seam between the registry and the network
//! - Rewrite an inbound request to target one backend instance
//! - Translate propagated transport errors into 502 Bad Gateway

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use tower::{Service, ServiceExt};
use url::Url;

use crate::observability::metrics;
use crate::routing::RoutingError;

/// Something able to serve a request for one backend instance.
pub trait Handler: Send + Sync + fmt::Debug {
    /// Serve the request. Failures are already turned into responses.
    fn serve(&self, req: Request<Body>) -> BoxFuture<'static, Response>;

    /// Human readable description of where requests go, for logs.
    fn target(&self) -> &str;
}

/// Handler shared between the registry and in-flight requests.
pub type SharedHandler = Arc<dyn Handler>;

/// Forwards requests to `scheme://address:port` through a transport service.
#[derive(Debug, Clone)]
pub struct Upstream<S> {
    subdomain: String,
    scheme: Scheme,
    authority: Authority,
    target: String,
    transport: S,
}

impl<S> Upstream<S> {
    /// Create a handler forwarding to `address:port`.
    ///
    /// IPv6 addresses may be given with or without brackets.
    pub fn new(
        subdomain: &str,
        scheme: &str,
        address: &str,
        port: u16,
        transport: S,
    ) -> Result<Self, RoutingError> {
        let invalid = |reason: String| RoutingError::InvalidBackend {
            address: address.to_string(),
            reason,
        };

        let host = if address.contains(':') && !address.starts_with('[') {
            format!("[{address}]")
        } else {
            address.to_string()
        };
        let base = Url::parse(&format!("{scheme}://{host}:{port}/"))
            .map_err(|e| invalid(e.to_string()))?;
        if base.path() != "/" || !base.username().is_empty() || base.port_or_known_default() != Some(port) {
            return Err(invalid("not a plain host".to_string()));
        }
        let host = base
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;

        let authority =
            Authority::from_str(&format!("{host}:{port}")).map_err(|e| invalid(e.to_string()))?;
        let scheme = Scheme::from_str(base.scheme()).map_err(|e| invalid(e.to_string()))?;
        let target = format!("{scheme}://{authority}");

        Ok(Self {
            subdomain: subdomain.to_lowercase(),
            scheme,
            authority,
            target,
            transport,
        })
    }

    /// Point the request at this backend, keeping path, query and headers.
    fn rewrite(&self, req: Request<Body>) -> Request<Body> {
        let (mut parts, body) = req.into_parts();

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(self.scheme.clone());
        uri_parts.authority = Some(self.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        if let Ok(uri) = Uri::from_parts(uri_parts) {
            parts.uri = uri;
        }
        // The outbound client speaks HTTP/1.1 to backends.
        parts.version = Version::HTTP_11;

        Request::from_parts(parts, body)
    }
}

impl<S> Handler for Upstream<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + fmt::Debug + 'static,
    S::Error: fmt::Display + Send + 'static,
    S::Future: Send + 'static,
{
    fn serve(&self, req: Request<Body>) -> BoxFuture<'static, Response> {
        let req = self.rewrite(req);
        let transport = self.transport.clone();
        let subdomain = self.subdomain.clone();
        let target = self.target.clone();

        Box::pin(async move {
            match transport.oneshot(req).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(
                        subdomain = %subdomain,
                        backend = %target,
                        error = %e,
                        "Translating upstream error to 502"
                    );
                    metrics::record_bad_gateway(&subdomain);
                    (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
                }
            }
        })
    }

    fn target(&self) -> &str {
        &self.target
    }
}
