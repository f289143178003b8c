//! Backend registry.
//!
//! # Responsibilities
//! - Own the fixed set of backends in configuration order
//! - Expose health flags and load counters by id
//!
//! Backends are never added or removed after construction, so the
//! registry itself needs no lock; every mutable field is an atomic.

use std::sync::Arc;

use crate::config::BackendConfig;
use crate::load_balancer::backend::{Backend, BackendId};

/// The single source of truth for backend health and load.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
}

impl BackendRegistry {
    /// Create the registry from configuration, keeping configuration order.
    pub fn new(configs: &[BackendConfig]) -> Self {
        let backends = configs
            .iter()
            .enumerate()
            .map(|(i, config)| {
                Arc::new(Backend::new(BackendId(i), &config.name, &config.address))
            })
            .collect();
        Self { backends }
    }

    /// All backends in stable iteration order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Look up a backend.
    ///
    /// # Panics
    /// If `id` was not issued by this registry.
    pub fn get(&self, id: BackendId) -> &Arc<Backend> {
        &self.backends[id.0]
    }

    pub fn is_healthy(&self, id: BackendId) -> bool {
        self.get(id).is_healthy()
    }

    /// Set the health flag, returning the previous value.
    pub fn set_healthy(&self, id: BackendId, healthy: bool) -> bool {
        self.get(id).set_healthy(healthy)
    }

    pub fn increment_load(&self, id: BackendId) {
        self.get(id).inc_connections();
    }

    pub fn decrement_load(&self, id: BackendId) {
        self.get(id).dec_connections();
    }

    pub fn load_of(&self, id: BackendId) -> usize {
        self.get(id).active_connections()
    }

    /// Number of backends currently flagged healthy.
    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }
}
