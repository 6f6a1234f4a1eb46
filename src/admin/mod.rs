//! Admin API, mounted under `/proxy/admin`.
//!
//! ```text
//! GET  /status                  version and registry summary
//! POST /control                 apply an Add/Remove control event
//! GET  /subdomains              registered patterns, in order
//! GET  /subdomains/{subdomain}  existence and live backends on the origin port
//! ```
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/control", post(post_control))
        .route("/subdomains", get(list_subdomains))
        .route("/subdomains/{subdomain}", get(show_subdomain))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
