//! Backend registry for one subdomain pattern.
//!
//! # Responsibilities
//! - Hold the backend handles of one subdomain, keyed by port then address
//! - Apply the selection policy to pick a live handler for a port
//! - Evict handles found dead, under exclusive access only

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::load_balancer::{backend::BackendHandle, LoadBalancer};
use crate::proxy::handler::SharedHandler;

/// Result of resolving a port against a registry.
#[derive(Debug, Default)]
pub struct Lookup {
    /// Handler of the selected live backend.
    pub handler: Option<SharedHandler>,
    /// Number of dead handles observed for the port.
    pub expired: usize,
}

/// Port → address → handle map of one subdomain.
///
/// Addresses are kept sorted so the selection policy walks them in a
/// defined order.
#[derive(Debug)]
pub struct BackendRegistry {
    ports: HashMap<u16, BTreeMap<String, BackendHandle>>,
    balancer: Box<dyn LoadBalancer>,
    ttl: Duration,
}

impl BackendRegistry {
    /// Create an empty registry whose handles live for `ttl`.
    pub fn new(ttl: Duration, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            ports: HashMap::new(),
            balancer,
            ttl,
        }
    }

    /// Pick a live handler for `port`.
    ///
    /// Never mutates the registry, so it is safe under shared access. Dead
    /// handles are skipped and counted; removing them is the job of
    /// [`BackendRegistry::evict_expired`].
    pub fn resolve(&self, port: u16, now: Instant) -> Lookup {
        let Some(handles) = self.ports.get(&port) else {
            return Lookup::default();
        };

        let backends: Vec<&BackendHandle> = handles.values().collect();
        let expired = backends.iter().filter(|h| !h.alive_at(now)).count();
        let handler = self
            .balancer
            .next_backend(&backends, now)
            .map(|index| backends[index].handler().clone());

        Lookup { handler, expired }
    }

    /// Install a handle with a full TTL, replacing any previous one.
    ///
    /// Returns true if a handle was replaced.
    pub fn insert(
        &mut self,
        port: u16,
        address: impl Into<String>,
        handler: SharedHandler,
        now: Instant,
    ) -> bool {
        self.ports
            .entry(port)
            .or_default()
            .insert(address.into(), BackendHandle::new_at(handler, self.ttl, now))
            .is_some()
    }

    /// Delete the handle for (port, address), alive or not.
    pub fn remove(&mut self, port: u16, address: &str) -> bool {
        let Some(handles) = self.ports.get_mut(&port) else {
            return false;
        };
        let removed = handles.remove(address).is_some();
        if handles.is_empty() {
            self.ports.remove(&port);
        }
        removed
    }

    /// Reset the deadline of an existing handle to a full TTL from `now`.
    pub fn renew(&mut self, port: u16, address: &str, now: Instant) -> bool {
        match self.ports.get_mut(&port).and_then(|h| h.get_mut(address)) {
            Some(handle) => {
                handle.renew_at(now);
                true
            }
            None => false,
        }
    }

    /// Delete every handle of `port` that is dead at `now`.
    ///
    /// Returns the evicted addresses. The port entry goes away with its last
    /// handle.
    pub fn evict_expired(&mut self, port: u16, now: Instant) -> Vec<String> {
        let Some(handles) = self.ports.get_mut(&port) else {
            return Vec::new();
        };

        let dead: Vec<String> = handles
            .iter()
            .filter(|(_, handle)| !handle.alive_at(now))
            .map(|(address, _)| address.clone())
            .collect();
        for address in &dead {
            handles.remove(address);
        }
        if handles.is_empty() {
            self.ports.remove(&port);
        }
        dead
    }

    /// Addresses registered for `port` that are alive at `now`.
    pub fn live_addresses(&self, port: u16, now: Instant) -> Vec<String> {
        self.ports
            .get(&port)
            .map(|handles| {
                handles
                    .iter()
                    .filter(|(_, handle)| handle.alive_at(now))
                    .map(|(address, _)| address.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ports that currently have at least one handle.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.ports.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Return true if no handle is registered on any port.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
