//! Sticky client-to-backend affinity.
//!
//! # Responsibilities
//! - Remember the last backend chosen for each client
//! - Reuse it while it is healthy, otherwise fall back to the policy
//!
//! # Design Decisions
//! - Health is checked when an entry is read, never when it is written:
//!   the table records the last decision, not a currently valid one
//! - Entries never expire

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::load_balancer::{
    backend::{Backend, BackendId},
    pool::BackendRegistry,
    LoadBalancer,
};

/// Client identifier → last chosen backend.
#[derive(Debug, Default)]
pub struct AffinityTable {
    entries: DashMap<IpAddr, BackendId>,
}

impl AffinityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client: IpAddr) -> Option<BackendId> {
        self.entries.get(&client).map(|entry| *entry)
    }

    /// Bind `client` to `backend`, replacing any previous entry.
    pub fn bind(&self, client: IpAddr, backend: BackendId) {
        self.entries.insert(client, backend);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Affinity layered over a selection policy.
pub struct StickySelector {
    registry: Arc<BackendRegistry>,
    policy: Box<dyn LoadBalancer>,
    affinity: AffinityTable,
}

impl StickySelector {
    pub fn new(registry: Arc<BackendRegistry>, policy: Box<dyn LoadBalancer>) -> Self {
        Self {
            registry,
            policy,
            affinity: AffinityTable::new(),
        }
    }

    /// Resolve the backend for `client`.
    ///
    /// Returns `None` only when the policy cannot produce a healthy backend.
    pub fn resolve(&self, client: IpAddr) -> Option<Arc<Backend>> {
        if let Some(id) = self.affinity.get(client) {
            let backend = self.registry.get(id);
            if backend.is_healthy() {
                tracing::debug!(client = %client, backend = %backend.name(), "Sticky backend reused");
                return Some(backend.clone());
            }
            tracing::debug!(client = %client, backend = %backend.name(), "Sticky backend unhealthy, reselecting");
        }

        let backend = self.select_healthy(client)?;
        self.affinity.bind(client, backend.id());
        Some(backend)
    }

    /// Ask the policy until it yields a healthy backend, at most once per backend.
    fn select_healthy(&self, client: IpAddr) -> Option<Arc<Backend>> {
        let backends = self.registry.backends();
        for _ in 0..backends.len() {
            let candidate = self.policy.next_server(backends, client)?;
            if candidate.is_healthy() {
                return Some(candidate);
            }
        }
        None
    }

    pub fn affinity(&self) -> &AffinityTable {
        &self.affinity
    }
}

impl std::fmt::Debug for StickySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickySelector")
            .field("backends", &self.registry.len())
            .field("affinity_entries", &self.affinity.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::load_balancer::{least_conn::LeastConnections, round_robin::RoundRobin};
    use std::net::Ipv4Addr;

    fn registry(n: usize) -> Arc<BackendRegistry> {
        let configs: Vec<_> = (0..n)
            .map(|i| BackendConfig {
                name: format!("web{}", i + 1),
                address: format!("127.0.0.1:{}", 9000 + i),
            })
            .collect();
        Arc::new(BackendRegistry::new(&configs))
    }

    fn client(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn client_sticks_while_healthy() {
        let registry = registry(3);
        let selector = StickySelector::new(registry.clone(), Box::new(RoundRobin::new()));

        let first = selector.resolve(client(1)).unwrap();
        // other clients advance the round-robin counter
        selector.resolve(client(2)).unwrap();
        selector.resolve(client(3)).unwrap();

        for _ in 0..5 {
            assert_eq!(selector.resolve(client(1)).unwrap().id(), first.id());
        }
        assert_eq!(selector.affinity().len(), 3);
    }

    #[test]
    fn unhealthy_binding_is_replaced() {
        let registry = registry(2);
        let selector = StickySelector::new(registry.clone(), Box::new(LeastConnections::new()));

        let first = selector.resolve(client(1)).unwrap();
        assert_eq!(first.id(), BackendId(0));

        registry.set_healthy(first.id(), false);
        let second = selector.resolve(client(1)).unwrap();
        assert_eq!(second.id(), BackendId(1));
        assert_eq!(selector.affinity().get(client(1)), Some(BackendId(1)));

        // recovery does not move the client back
        registry.set_healthy(first.id(), true);
        assert_eq!(selector.resolve(client(1)).unwrap().id(), BackendId(1));
    }

    #[test]
    fn round_robin_picks_are_health_checked() {
        let registry = registry(3);
        registry.set_healthy(BackendId(0), false);
        let selector = StickySelector::new(registry.clone(), Box::new(RoundRobin::new()));

        assert_eq!(selector.resolve(client(1)).unwrap().id(), BackendId(1));
        assert_eq!(selector.resolve(client(2)).unwrap().id(), BackendId(2));
        assert_eq!(selector.resolve(client(3)).unwrap().id(), BackendId(1));
    }

    #[test]
    fn no_healthy_backend_keeps_stale_entry() {
        let registry = registry(2);
        let selector = StickySelector::new(registry.clone(), Box::new(RoundRobin::new()));

        assert_eq!(selector.resolve(client(1)).unwrap().id(), BackendId(0));
        registry.set_healthy(BackendId(0), false);
        registry.set_healthy(BackendId(1), false);

        assert!(selector.resolve(client(1)).is_none());
        assert_eq!(selector.affinity().get(client(1)), Some(BackendId(0)));
    }
}
