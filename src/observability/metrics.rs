//! Metrics collection and exposition.
//!
//! # Metrics
//! - `feature_proxy_requests_total` (counter): inbound requests by method, status
//! - `feature_proxy_request_duration_seconds` (histogram): latency distribution
//! - `feature_proxy_route_misses_total` (counter): requests with no live backend
//! - `feature_proxy_auth_rejections_total` (counter): 403s by subdomain
//! - `feature_proxy_upstream_timeouts_total` (counter): 504s by subdomain
//! - `feature_proxy_upstream_errors_total` (counter): transport failures by subdomain
//! - `feature_proxy_bad_gateway_total` (counter): 502s by subdomain
//! - `feature_proxy_backends_expired_total` (counter): evicted handles by subdomain
//! - `feature_proxy_control_events_total` (counter): control events by action, outcome
//!
//! Until [`init_metrics`] installs the Prometheus recorder every call here
//! is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::routing::ControlAction;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "feature_proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("feature_proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_miss() {
    ::metrics::counter!("feature_proxy_route_misses_total").increment(1);
}

pub fn record_auth_rejection(subdomain: &str) {
    ::metrics::counter!("feature_proxy_auth_rejections_total", "subdomain" => subdomain.to_string())
        .increment(1);
}

pub fn record_upstream_timeout(subdomain: &str) {
    ::metrics::counter!("feature_proxy_upstream_timeouts_total", "subdomain" => subdomain.to_string())
        .increment(1);
}

pub fn record_upstream_error(subdomain: &str) {
    ::metrics::counter!("feature_proxy_upstream_errors_total", "subdomain" => subdomain.to_string())
        .increment(1);
}

pub fn record_bad_gateway(subdomain: &str) {
    ::metrics::counter!("feature_proxy_bad_gateway_total", "subdomain" => subdomain.to_string())
        .increment(1);
}

pub fn record_backend_expired(subdomain: &str) {
    ::metrics::counter!("feature_proxy_backends_expired_total", "subdomain" => subdomain.to_string())
        .increment(1);
}

pub fn record_control_event(action: ControlAction, outcome: &str) {
    ::metrics::counter!(
        "feature_proxy_control_events_total",
        "action" => action.as_str(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
