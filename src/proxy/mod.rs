//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Control event (Add)
//!     → FeatureProxy builds an Upstream handler (handler.rs)
//!         wrapping AuthTransport (transport.rs, auth.rs)
//!         wrapping HttpTransport (hyper-util client)
//!     → DomainRouter stores it in the subdomain's registry
//!
//! Inbound request
//!     → FeatureProxy derives the subdomain (feature header, host, default)
//!     → DomainRouter finds a live handler for the origin port
//!     → Upstream rewrites the URI and drives the transport
//!     → 403 / 504 synthesized by the transport (response.rs)
//!     → other transport errors become 502 in the handler
//! ```

pub mod auth;
pub mod handler;
pub mod response;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    response::Response,
};

use crate::config::{OriginConfig, ProxyConfig};
use crate::http::request::{request_host, subdomain_token};
use crate::observability::metrics;
use crate::routing::{ControlEvent, ControlOutcome, DomainRouter, HandlerFactory, RoutingError};

use self::auth::{CookieValidator, SharedSecretValidator};
use self::handler::{SharedHandler, Upstream};
use self::transport::{AuthTransport, HttpTransport, TransportSettings};

/// The routing core plus everything needed to build handlers for it.
pub struct FeatureProxy {
    router: Arc<DomainRouter>,
    transport: HttpTransport,
    origin: OriginConfig,
    feature_header: String,
    cookie_name: String,
    validator: Option<Arc<dyn CookieValidator>>,
    timeout: Duration,
}

impl FeatureProxy {
    /// Build the proxy from validated configuration.
    ///
    /// Authentication uses [`SharedSecretValidator`] when `auth.cookie_secret`
    /// is set; see [`FeatureProxy::with_validator`] to plug in another check.
    pub fn new(config: &ProxyConfig) -> Self {
        let validator = config
            .auth
            .cookie_secret
            .clone()
            .map(|secret| Arc::new(SharedSecretValidator::new(secret)) as Arc<dyn CookieValidator>);

        Self {
            router: Arc::new(DomainRouter::from_config(&config.registry)),
            transport: HttpTransport::new(Duration::from_millis(config.upstream.connect_timeout_ms)),
            origin: config.origin.clone(),
            feature_header: config.auth.feature_header.clone(),
            cookie_name: config.auth.cookie_name.clone(),
            validator,
            timeout: Duration::from_millis(config.upstream.timeout_ms),
        }
    }

    /// Replace the cookie validator used for handlers added from now on.
    pub fn with_validator(mut self, validator: Option<Arc<dyn CookieValidator>>) -> Self {
        self.validator = validator;
        self
    }

    pub fn router(&self) -> &Arc<DomainRouter> {
        &self.router
    }

    /// Port key used for inbound traffic.
    pub fn origin_port(&self) -> u16 {
        self.origin.port
    }

    /// Apply an administrative Add/Remove event.
    pub fn apply(&self, event: &ControlEvent) -> Result<ControlOutcome, RoutingError> {
        let result = self.router.apply(event, self);
        match &result {
            Ok(outcome) => metrics::record_control_event(event.action, outcome.as_str()),
            Err(e) => {
                tracing::warn!(
                    subdomain = %event.subdomain,
                    address = %event.address,
                    port = event.port,
                    error = %e,
                    "Control event rejected"
                );
                metrics::record_control_event(event.action, "rejected");
            }
        }
        result
    }

    /// Routing token for an inbound request.
    ///
    /// The feature header wins over the host. A missing or unregistered
    /// token falls back to the default subdomain when one is configured.
    pub fn subdomain_for(&self, req: &Request<Body>) -> String {
        let token = req
            .headers()
            .get(self.feature_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
            .or_else(|| {
                request_host(req).and_then(|host| subdomain_token(host, &self.origin.base_domain))
            });

        match token {
            Some(token) if self.router.exists(&token) => token,
            token if !self.origin.default_subdomain.is_empty() => {
                tracing::debug!(token = ?token, default = %self.origin.default_subdomain, "Using default subdomain");
                self.origin.default_subdomain.to_lowercase()
            }
            token => token.unwrap_or_default(),
        }
    }

    /// Route an inbound request to a live backend of its subdomain.
    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        let subdomain = self.subdomain_for(&req);
        self.router
            .serve_subdomain(&subdomain, req, self.origin.port)
            .await
    }
}

impl HandlerFactory for FeatureProxy {
    fn build(&self, subdomain: &str, address: &str, port: u16) -> Result<SharedHandler, RoutingError> {
        let transport = AuthTransport::new(
            self.transport.clone(),
            TransportSettings {
                subdomain: subdomain.to_lowercase(),
                timeout: self.timeout,
                cookie_name: self.cookie_name.clone(),
                validator: self.validator.clone(),
            },
        );
        let upstream = Upstream::new(subdomain, &self.origin.scheme, address, port, transport)?;
        Ok(Arc::new(upstream))
    }
}
