//! Domain router: subdomain + port → live backend handler.
//!
//! # Responsibilities
//! - Own the registered subdomain patterns and their backend registries
//! - Resolve a request to a registry, then to a live handler
//! - Apply Add/Remove control events
//!
//! # Design Decisions
//! - One `RwLock` around all routing state
//! - Lookups hold the read lock only; when they observe dead handles the
//!   router re-acquires the lock exclusively to evict them, re-checking
//!   liveness since an Add may have raced in between
//! - Exact O(1) registry lookup, then O(n) pattern scan in insertion order

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::RegistryConfig;
use crate::http::request::{request_host, subdomain_token};
use crate::load_balancer::{BackendRegistry, SelectionPolicy, DEFAULT_TTL};
use crate::observability::metrics;
use crate::proxy::handler::SharedHandler;
use crate::routing::control::{ControlAction, ControlEvent, ControlOutcome, HandlerFactory};
use crate::routing::matcher::SubdomainPattern;
use crate::routing::RoutingError;

#[derive(Debug, Default)]
struct RouterState {
    /// Registered patterns, in registration order.
    patterns: Vec<SubdomainPattern>,
    /// One registry per registered pattern, keyed by the pattern string.
    registries: HashMap<String, BackendRegistry>,
}

impl RouterState {
    /// Registry serving `subdomain`, with the key it is registered under.
    fn registry_for(&self, subdomain: &str) -> Option<(&str, &BackendRegistry)> {
        if let Some((key, registry)) = self.registries.get_key_value(subdomain) {
            return Some((key.as_str(), registry));
        }
        let pattern = self.patterns.iter().find(|p| p.matches(subdomain))?;
        self.registries
            .get(pattern.as_str())
            .map(|registry| (pattern.as_str(), registry))
    }
}

/// Routes requests to dynamically registered backends by subdomain and port.
#[derive(Debug)]
pub struct DomainRouter {
    state: RwLock<RouterState>,
    ttl: Duration,
    selection: SelectionPolicy,
    seed: Option<u64>,
}

impl Default for DomainRouter {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, SelectionPolicy::default(), None)
    }
}

impl DomainRouter {
    /// Create an empty router.
    ///
    /// Every registration lives for `ttl` unless renewed; each subdomain gets
    /// its own balancer implementing `selection`.
    pub fn new(ttl: Duration, selection: SelectionPolicy, seed: Option<u64>) -> Self {
        Self {
            state: RwLock::new(RouterState::default()),
            ttl,
            selection,
            seed,
        }
    }

    /// Create an empty router from the registry configuration.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            Duration::from_secs(config.ttl_secs),
            config.selection,
            config.seed,
        )
    }

    /// Lifetime of a registration without renewal.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // Routing state is consistent between statements, so a panic elsewhere
    // never leaves it half-updated.
    fn read(&self) -> RwLockReadGuard<'_, RouterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RouterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve a request whose subdomain is the first label of its host.
    pub async fn serve_with_port(&self, req: Request<Body>, port: u16) -> Response {
        let subdomain = request_host(&req)
            .and_then(|host| subdomain_token(host, ""))
            .unwrap_or_default();
        self.serve_subdomain(&subdomain, req, port).await
    }

    /// Serve a request for an already derived subdomain token.
    ///
    /// Misses answer 404 without touching the network.
    pub async fn serve_subdomain(&self, subdomain: &str, req: Request<Body>, port: u16) -> Response {
        match self.find_handler(subdomain, port) {
            Some(handler) => {
                tracing::debug!(
                    subdomain = %subdomain,
                    port,
                    backend = %handler.target(),
                    "Proxy handler found"
                );
                handler.serve(req).await
            }
            None => {
                tracing::debug!(subdomain = %subdomain, port, "Proxy handler not found");
                metrics::record_route_miss();
                (StatusCode::NOT_FOUND, "404 page not found").into_response()
            }
        }
    }

    /// Find a live handler for `subdomain` on `port`.
    ///
    /// An exact registration wins; otherwise the first pattern (in
    /// registration order) matching the subdomain is used. Dead handles met
    /// on the way are evicted.
    pub fn find_handler(&self, subdomain: &str, port: u16) -> Option<SharedHandler> {
        let subdomain = subdomain.to_lowercase();

        let (key, lookup) = {
            let state = self.read();
            let (key, registry) = state.registry_for(&subdomain)?;
            (key.to_string(), registry.resolve(port, Instant::now()))
        };

        if lookup.expired > 0 {
            self.evict_expired(&key, port);
        }
        if lookup.handler.is_none() {
            tracing::debug!(subdomain = %subdomain, pattern = %key, port, "No live backend");
        }
        lookup.handler
    }

    fn evict_expired(&self, key: &str, port: u16) {
        let mut state = self.write();
        let Some(registry) = state.registries.get_mut(key) else {
            return;
        };
        for address in registry.evict_expired(port, Instant::now()) {
            tracing::info!(subdomain = %key, port, address = %address, "Proxy handler is dead");
            metrics::record_backend_expired(key);
        }
    }

    /// Return true if `subdomain` would resolve to a registry, ignoring
    /// whether any backend in it is alive.
    pub fn exists(&self, subdomain: &str) -> bool {
        let subdomain = subdomain.to_lowercase();
        self.read().registry_for(&subdomain).is_some()
    }

    /// Snapshot of the registered patterns, in registration order.
    pub fn subdomains(&self) -> Vec<String> {
        self.read()
            .patterns
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    /// Live backend addresses serving `subdomain` on `port`.
    pub fn backends(&self, subdomain: &str, port: u16) -> Vec<String> {
        let subdomain = subdomain.to_lowercase();
        self.read()
            .registry_for(&subdomain)
            .map(|(_, registry)| registry.live_addresses(port, Instant::now()))
            .unwrap_or_default()
    }

    /// Register (or replace) the backend `address` of `subdomain` on `port`.
    pub fn add(
        &self,
        subdomain: &str,
        port: u16,
        address: &str,
        handler: SharedHandler,
    ) -> Result<ControlOutcome, RoutingError> {
        let pattern = SubdomainPattern::new(subdomain)?;

        let mut guard = self.write();
        let state = &mut *guard;
        let registry = match state.registries.entry(pattern.as_str().to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::info!(
                    subdomain = %pattern,
                    wildcard = pattern.is_wildcard(),
                    "New subdomain registered"
                );
                state.patterns.push(pattern.clone());
                entry.insert(BackendRegistry::new(self.ttl, self.selection.build(self.seed)))
            }
        };

        let replaced = registry.insert(port, address, handler, Instant::now());
        tracing::info!(subdomain = %pattern, port, address = %address, replaced, "New proxy handler");

        Ok(if replaced {
            ControlOutcome::Replaced
        } else {
            ControlOutcome::Added
        })
    }

    /// Delete the backend `address` of `subdomain` on `port`, alive or not.
    ///
    /// Removing something that is not registered is a no-op.
    pub fn remove(&self, subdomain: &str, port: u16, address: &str) -> ControlOutcome {
        let key = subdomain.to_lowercase();
        let removed = self
            .write()
            .registries
            .get_mut(&key)
            .is_some_and(|registry| registry.remove(port, address));

        if removed {
            tracing::info!(subdomain = %key, port, address = %address, "Proxy handler removed");
            ControlOutcome::Removed
        } else {
            tracing::debug!(subdomain = %key, port, address = %address, "Nothing to remove");
            ControlOutcome::NotFound
        }
    }

    /// Give an existing registration a full TTL from now.
    pub fn renew(&self, subdomain: &str, port: u16, address: &str) -> bool {
        let key = subdomain.to_lowercase();
        self.write()
            .registries
            .get_mut(&key)
            .is_some_and(|registry| registry.renew(port, address, Instant::now()))
    }

    /// Apply a control event, building handlers for Add through `factory`.
    pub fn apply(
        &self,
        event: &ControlEvent,
        factory: &dyn HandlerFactory,
    ) -> Result<ControlOutcome, RoutingError> {
        match event.action {
            ControlAction::Add => {
                let handler = factory.build(&event.subdomain, &event.address, event.port)?;
                self.add(&event.subdomain, event.port, &event.address, handler)
            }
            ControlAction::Remove => Ok(self.remove(&event.subdomain, event.port, &event.address)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::handler::testing::{label_of, StaticHandler};
    use axum::body::to_bytes;

    fn router() -> DomainRouter {
        DomainRouter::default()
    }

    fn found(router: &DomainRouter, subdomain: &str, port: u16) -> Option<String> {
        router.find_handler(subdomain, port).as_ref().map(label_of)
    }

    struct Labels;

    impl HandlerFactory for Labels {
        fn build(&self, subdomain: &str, address: &str, port: u16) -> Result<SharedHandler, RoutingError> {
            Ok(StaticHandler::shared(&format!("{subdomain}@{address}:{port}")))
        }
    }

    #[test]
    fn test_add_then_find() {
        let router = router();
        router.add("Feat-X", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();

        assert_eq!(found(&router, "feat-x", 443).as_deref(), Some("x"));
        assert_eq!(found(&router, "FEAT-X", 443).as_deref(), Some("x"));
        assert_eq!(found(&router, "feat-x", 80), None);
        assert_eq!(found(&router, "feat-y", 443), None);
    }

    #[test]
    fn test_add_with_huge_ttl() {
        let router = DomainRouter::new(Duration::MAX, SelectionPolicy::RoundRobin, None);
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();
        assert!(router.renew("feat-x", 443, "10.0.0.5"));
        assert_eq!(found(&router, "feat-x", 443).as_deref(), Some("x"));
    }

    #[test]
    fn test_expired_handle_is_evicted() {
        let router = DomainRouter::new(Duration::from_millis(50), SelectionPolicy::RoundRobin, None);
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();
        assert!(found(&router, "feat-x", 443).is_some());

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(found(&router, "feat-x", 443), None);

        let state = router.read();
        assert!(state.registries["feat-x"].is_empty());
        // The pattern itself stays registered.
        assert_eq!(state.patterns.len(), 1);
    }

    #[test]
    fn test_dead_backend_skipped_for_live_one() {
        let router = DomainRouter::new(Duration::from_millis(50), SelectionPolicy::RoundRobin, None);
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("old")).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        router.add("feat-x", 443, "10.0.0.6", StaticHandler::shared("new")).unwrap();

        assert_eq!(found(&router, "feat-x", 443).as_deref(), Some("new"));
        assert_eq!(router.backends("feat-x", 443), vec!["10.0.0.6".to_string()]);
        assert_eq!(router.read().registries["feat-x"].live_addresses(443, Instant::now()).len(), 1);
    }

    #[test]
    fn test_renew_extends_life() {
        let router = DomainRouter::new(Duration::from_millis(80), SelectionPolicy::RoundRobin, None);
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(router.renew("feat-x", 443, "10.0.0.5"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(found(&router, "feat-x", 443).is_some());

        assert!(!router.renew("feat-x", 443, "10.0.0.9"));
        assert!(!router.renew("feat-y", 443, "10.0.0.5"));
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let router = router();
        router.add("pr-*", 443, "10.0.0.1", StaticHandler::shared("wild")).unwrap();
        router.add("pr-1", 443, "10.0.0.2", StaticHandler::shared("exact")).unwrap();

        assert_eq!(found(&router, "pr-1", 443).as_deref(), Some("exact"));
        assert_eq!(found(&router, "pr-2", 443).as_deref(), Some("wild"));
    }

    #[test]
    fn test_first_registered_wildcard_wins() {
        let router = router();
        router.add("pr-*", 443, "10.0.0.1", StaticHandler::shared("broad")).unwrap();
        router.add("pr-1*", 443, "10.0.0.2", StaticHandler::shared("narrow")).unwrap();

        assert_eq!(found(&router, "pr-12", 443).as_deref(), Some("broad"));
    }

    #[test]
    fn test_no_fallback_after_registry_chosen() {
        let router = router();
        router.add("pr-*", 443, "10.0.0.1", StaticHandler::shared("pr")).unwrap();
        router.add("*", 8080, "10.0.0.2", StaticHandler::shared("any")).unwrap();

        assert_eq!(found(&router, "pr-1", 8080), None);
        assert_eq!(found(&router, "main", 8080).as_deref(), Some("any"));
    }

    #[test]
    fn test_exists_ignores_liveness() {
        let router = DomainRouter::new(Duration::from_millis(10), SelectionPolicy::RoundRobin, None);
        router.add("pr-*", 443, "10.0.0.1", StaticHandler::shared("pr")).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert!(router.exists("pr-7"));
        assert!(router.exists("PR-7"));
        assert!(router.exists("pr-*"));
        assert!(!router.exists("main"));
        assert_eq!(found(&router, "pr-7", 443), None);
        assert!(router.exists("pr-7"));
    }

    #[test]
    fn test_subdomains_snapshot_is_detached() {
        let router = router();
        router.add("b", 443, "10.0.0.1", StaticHandler::shared("b")).unwrap();
        router.add("a-*", 443, "10.0.0.2", StaticHandler::shared("a")).unwrap();

        let snapshot = router.subdomains();
        router.add("c", 443, "10.0.0.3", StaticHandler::shared("c")).unwrap();
        router.remove("b", 443, "10.0.0.1");

        assert_eq!(snapshot, vec!["b", "a-*"]);
        assert_eq!(router.subdomains(), vec!["b", "a-*", "c"]);
    }

    #[test]
    fn test_remove() {
        let router = router();
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();

        assert_eq!(router.remove("feat-x", 443, "10.0.0.9"), ControlOutcome::NotFound);
        assert_eq!(router.remove("feat-y", 443, "10.0.0.5"), ControlOutcome::NotFound);
        assert_eq!(router.remove("FEAT-X", 443, "10.0.0.5"), ControlOutcome::Removed);
        assert_eq!(found(&router, "feat-x", 443), None);
        assert_eq!(router.remove("feat-x", 443, "10.0.0.5"), ControlOutcome::NotFound);
    }

    #[test]
    fn test_remove_dead_handle() {
        let router = DomainRouter::new(Duration::from_millis(10), SelectionPolicy::RoundRobin, None);
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(router.remove("feat-x", 443, "10.0.0.5"), ControlOutcome::Removed);
    }

    #[test]
    fn test_apply_events() {
        let router = router();

        let add = ControlEvent::add("feat-x", "10.0.0.5", 443);
        assert_eq!(router.apply(&add, &Labels), Ok(ControlOutcome::Added));
        assert_eq!(router.apply(&add, &Labels), Ok(ControlOutcome::Replaced));
        assert_eq!(found(&router, "feat-x", 443).as_deref(), Some("feat-x@10.0.0.5:443"));

        let remove = ControlEvent::remove("feat-x", "10.0.0.5", 443);
        assert_eq!(router.apply(&remove, &Labels), Ok(ControlOutcome::Removed));
        assert_eq!(router.apply(&remove, &Labels), Ok(ControlOutcome::NotFound));

        let bad = ControlEvent::add("pr-[", "10.0.0.5", 443);
        assert!(matches!(
            router.apply(&bad, &Labels),
            Err(RoutingError::InvalidPattern { .. })
        ));
        assert!(router.subdomains().iter().all(|s| s != "pr-["));
    }

    #[test]
    fn test_random_policy_routes() {
        let router = DomainRouter::new(DEFAULT_TTL, SelectionPolicy::Random, Some(3));
        router.add("feat-x", 443, "10.0.0.1", StaticHandler::shared("a")).unwrap();
        router.add("feat-x", 443, "10.0.0.2", StaticHandler::shared("b")).unwrap();

        let mut seen: Vec<String> = (0..100).filter_map(|_| found(&router, "feat-x", 443)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_serve_with_port() {
        let router = router();
        router.add("feat-x", 443, "10.0.0.5", StaticHandler::shared("x")).unwrap();

        let req = Request::builder()
            .uri("/path")
            .header("host", "Feat-X.preview.example.com:18080")
            .body(Body::empty())
            .unwrap();
        let response = router.serve_with_port(req, 443).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"x");

        let req = Request::builder()
            .uri("/path")
            .header("host", "other.preview.example.com")
            .body(Body::empty())
            .unwrap();
        let response = router.serve_with_port(req, 443).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
