//! Outbound transport.
//!
//! # Responsibilities
//! - Perform the network round trip to a backend (`HttpTransport`)
//! - Authenticate requests by cookie before any network call (`AuthTransport`)
//! - Bound each round trip by a per-request deadline
//!
//! # Request State Machine
//! ```text
//! OPTIONS ─────────────────────────────┐
//! no validator ────────────────────────┤
//! cookie accepted ─────────────────────┼─→ round trip
//! cookie missing / rejected → 403      │     ├─ timeout == 0 → inner result
//!                                      │     └─ timeout > 0
//!                                      │          ├─ in time → inner result
//!                                      │          └─ late    → 504
//! ```
//!
//! # Design Decisions
//! - Only the 403 and 504 bodies are produced here; any other transport
//!   error is returned unchanged for the caller to translate
//! - The deadline is scoped to the request future: dropping it (client gone)
//!   drops the in-flight call too
//! - Every failure path logs the subdomain with the error or condition

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tower::Service;

use crate::observability::metrics;
use crate::proxy::auth::{cookie_value, AuthError, CookieValidator};
use crate::proxy::response;

/// A round trip that failed below HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Plain HTTP/1.1 round trips through a pooled hyper client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    /// Create a transport. A zero `connect_timeout` leaves connects unbounded.
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout).filter(|t| !t.is_zero()));

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

impl Service<Request<Body>> for HttpTransport {
    type Response = Response;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<Response, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client.request(req).await?;
            Ok(response.map(Body::new))
        })
    }
}

/// Per-subdomain settings of an [`AuthTransport`].
#[derive(Clone)]
pub struct TransportSettings {
    /// Subdomain the wrapped handlers serve, for logs and the 504 body.
    pub subdomain: String,
    /// Deadline of one round trip. Zero disables it.
    pub timeout: Duration,
    /// Name of the cookie carrying the credential.
    pub cookie_name: String,
    /// Credential check. `None` disables authentication.
    pub validator: Option<Arc<dyn CookieValidator>>,
}

impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSettings")
            .field("subdomain", &self.subdomain)
            .field("timeout", &self.timeout)
            .field("cookie_name", &self.cookie_name)
            .field("authenticated", &self.validator.is_some())
            .finish()
    }
}

impl TransportSettings {
    fn authenticate<B>(&self, req: &Request<B>) -> Result<(), AuthError> {
        // Preflight requests carry no credentials.
        if req.method() == Method::OPTIONS {
            return Ok(());
        }
        let Some(validator) = &self.validator else {
            return Ok(());
        };
        let value = cookie_value(req.headers(), &self.cookie_name)
            .ok_or_else(|| AuthError::MissingCookie(self.cookie_name.clone()))?;
        validator.validate(value)
    }
}

/// Cookie authentication and a per-request deadline around a transport.
#[derive(Debug, Clone)]
pub struct AuthTransport<S> {
    inner: S,
    settings: Arc<TransportSettings>,
}

impl<S> AuthTransport<S> {
    pub fn new(inner: S, settings: TransportSettings) -> Self {
        Self {
            inner,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }
}

impl<S> Service<Request<Body>> for AuthTransport<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Keep the instance that was driven to readiness for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let settings = self.settings.clone();

        Box::pin(async move {
            let subdomain = settings.subdomain.as_str();
            let url = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            tracing::debug!(subdomain = %subdomain, url = %url, method = %req.method(), "Round trip");

            if let Err(e) = settings.authenticate(&req) {
                tracing::warn!(subdomain = %subdomain, url = %url, error = %e, "Round trip rejected");
                metrics::record_auth_rejection(subdomain);
                return Ok(response::forbidden());
            }

            if settings.timeout.is_zero() {
                return match inner.call(req).await {
                    Ok(response) => Ok(response),
                    Err(e) => {
                        tracing::warn!(subdomain = %subdomain, url = %url, error = %e, "Round trip failed");
                        metrics::record_upstream_error(subdomain);
                        Err(e)
                    }
                };
            }

            match tokio::time::timeout(settings.timeout, inner.call(req)).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => {
                    tracing::warn!(subdomain = %subdomain, url = %url, error = %e, "Round trip failed");
                    metrics::record_upstream_error(subdomain);
                    Err(e)
                }
                Err(_) => {
                    tracing::warn!(
                        subdomain = %subdomain,
                        url = %url,
                        timeout_ms = settings.timeout.as_millis() as u64,
                        "Round trip timed out"
                    );
                    metrics::record_upstream_timeout(subdomain);
                    Ok(response::gateway_timeout(subdomain, &url))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::auth::SharedSecretValidator;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::{service_fn, ServiceExt};

    fn settings(timeout_ms: u64, secret: Option<&str>) -> TransportSettings {
        TransportSettings {
            subdomain: "feat-x".to_string(),
            timeout: Duration::from_millis(timeout_ms),
            cookie_name: "auth".to_string(),
            validator: secret.map(|s| Arc::new(SharedSecretValidator::new(s)) as Arc<dyn CookieValidator>),
        }
    }

    /// Stand-in backend counting its calls, answering after `delay`.
    #[derive(Debug, Clone)]
    struct Counting {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl Service<Request<Body>> for Counting {
        type Response = Response;
        type Error = Infallible;
        type Future = BoxFuture<'static, Result<Response, Infallible>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: Request<Body>) -> Self::Future {
            let calls = self.calls.clone();
            let delay = self.delay;
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok("backend".into_response())
            })
        }
    }

    fn counting(calls: Arc<AtomicUsize>, delay: Duration) -> Counting {
        Counting { calls, delay }
    }

    fn request(method: Method, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri("http://10.0.0.5:8080/api/items?x=1");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 4096).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_cookie_is_forbidden_without_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = AuthTransport::new(counting(calls.clone(), Duration::ZERO), settings(0, Some("s3cret")));

        let response = transport.oneshot(request(Method::GET, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Forbidden");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_cookie_is_forbidden_without_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = AuthTransport::new(counting(calls.clone(), Duration::ZERO), settings(0, Some("s3cret")));

        let response = transport
            .oneshot(request(Method::POST, Some("auth=wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_cookie_passes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = AuthTransport::new(counting(calls.clone(), Duration::ZERO), settings(0, Some("s3cret")));

        let response = transport
            .oneshot(request(Method::GET, Some("theme=dark; auth=s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "backend");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_options_skips_auth() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = AuthTransport::new(counting(calls.clone(), Duration::ZERO), settings(1000, Some("s3cret")));

        let response = transport.oneshot(request(Method::OPTIONS, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_validator_skips_auth() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = AuthTransport::new(counting(calls.clone(), Duration::ZERO), settings(0, None));

        let response = transport.oneshot(request(Method::GET, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport =
            AuthTransport::new(counting(calls.clone(), Duration::from_millis(200)), settings(50, None));

        let response = transport.oneshot(request(Method::GET, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_text(response).await;
        assert!(body.contains("feat-x"), "{body}");
        assert!(body.contains("/api/items?x=1"), "{body}");
        assert!(!body.contains("10.0.0.5"), "{body}");
    }

    #[tokio::test]
    async fn test_fast_backend_within_deadline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport =
            AuthTransport::new(counting(calls.clone(), Duration::from_millis(10)), settings(500, None));

        let response = transport.oneshot(request(Method::GET, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let failing = service_fn(|_req: Request<Body>| async {
            Err::<Response, _>("connection refused".to_string())
        });
        for timeout_ms in [0, 500] {
            let transport = AuthTransport::new(failing, settings(timeout_ms, None));
            let err = transport.oneshot(request(Method::GET, None)).await.unwrap_err();
            assert_eq!(err, "connection refused");
        }
    }

    #[tokio::test]
    async fn test_dropping_request_cancels_call() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let slow = service_fn(move |_req: Request<Body>| {
            let f = f.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                f.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>("late".into_response())
            }
        });
        let transport = AuthTransport::new(slow, settings(0, None));

        let call = tokio::spawn(transport.oneshot(request(Method::GET, None)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        call.abort();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
