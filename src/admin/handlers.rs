use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::routing::{ControlEvent, ControlOutcome};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub origin_port: u16,
    pub subdomains: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub outcome: ControlOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubdomainStatus {
    pub subdomain: String,
    pub exists: bool,
    pub port: u16,
    pub backends: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        origin_port: state.proxy.origin_port(),
        subdomains: state.proxy.router().subdomains().len(),
    })
}

pub async fn post_control(
    State(state): State<AppState>,
    Json(event): Json<ControlEvent>,
) -> Result<Json<ControlResponse>, (StatusCode, Json<ErrorBody>)> {
    match state.proxy.apply(&event) {
        Ok(outcome) => Ok(Json(ControlResponse { outcome })),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )),
    }
}

pub async fn list_subdomains(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.proxy.router().subdomains())
}

pub async fn show_subdomain(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Json<SubdomainStatus> {
    let router = state.proxy.router();
    let port = state.proxy.origin_port();
    Json(SubdomainStatus {
        exists: router.exists(&subdomain),
        backends: router.backends(&subdomain, port),
        port,
        subdomain: subdomain.to_lowercase(),
    })
}
