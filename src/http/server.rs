//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: health check, admin API, proxy fallback
//! - Wire up middleware (request ID, tracing)
//! - Serve on a listener until shutdown is triggered
//! - Record per-request metrics for proxied traffic

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{AdminConfig, ProxyConfig};
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::proxy::FeatureProxy;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<FeatureProxy>,
    pub admin: Arc<AdminConfig>,
}

/// HTTP server for the feature proxy.
pub struct HttpServer {
    router: Router,
    proxy: Arc<FeatureProxy>,
}

impl HttpServer {
    /// Create a server whose proxy is built from `config`.
    pub fn new(config: ProxyConfig) -> Self {
        let proxy = FeatureProxy::new(&config);
        Self::with_proxy(&config, proxy)
    }

    /// Create a server around an already configured proxy.
    pub fn with_proxy(config: &ProxyConfig, proxy: FeatureProxy) -> Self {
        let state = AppState {
            proxy: Arc::new(proxy),
            admin: Arc::new(config.admin.clone()),
        };
        let proxy = state.proxy.clone();
        let router = Self::build_router(state);
        Self { router, proxy }
    }

    fn build_router(state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Router::new().route("/proxy/healthz", get(healthz));
        if state.admin.enabled {
            router = router.nest("/proxy/admin", admin::setup_admin_router(state.clone()));
        }

        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %req.method(),
                            uri = %req.uri(),
                            request_id = %request_id(req),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::new(x_request_id)),
            )
    }

    /// The proxy behind this server, for wiring control events in-process.
    pub fn proxy(&self) -> &Arc<FeatureProxy> {
        &self.proxy
    }

    /// The complete Axum router.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Route by subdomain to a live backend.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = state.proxy.dispatch(request).await;

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}
