//! Least Connections load balancing strategy.

use std::net::IpAddr;
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Least connections selector.
/// Selects the healthy backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>], _client: IpAddr) -> Option<Arc<Backend>> {
        // min_by_key keeps the first of equal elements, so ties go to registry order
        backends
            .iter()
            .filter(|b| b.is_healthy())
            .min_by_key(|b| b.active_connections())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendId;

    const CLIENT: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        (0..n)
            .map(|i| Arc::new(Backend::new(BackendId(i), format!("b{i}"), format!("127.0.0.1:{}", 8080 + i))))
            .collect()
    }

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let backends = backends(2);
        let (b1, b2) = (&backends[0], &backends[1]);

        // artificially increase connections on b1
        b1.inc_connections();

        // Should pick b2 (0 connections)
        assert_eq!(lb.next_server(&backends, CLIENT).unwrap().id(), b2.id());

        b2.inc_connections();
        b2.inc_connections(); // now b2 has 2, b1 has 1

        assert_eq!(lb.next_server(&backends, CLIENT).unwrap().id(), b1.id());
    }

    #[test]
    fn ties_follow_registry_order() {
        let lb = LeastConnections::new();
        let backends = backends(3);
        backends[0].inc_connections();

        assert_eq!(lb.next_server(&backends, CLIENT).unwrap().id(), BackendId(1));
    }

    #[test]
    fn skips_unhealthy_even_when_idle() {
        let lb = LeastConnections::new();
        let backends = backends(3);
        backends[1].inc_connections();
        backends[2].inc_connections();
        backends[2].inc_connections();
        backends[0].set_healthy(false);

        assert_eq!(lb.next_server(&backends, CLIENT).unwrap().id(), BackendId(1));
    }

    #[test]
    fn none_when_all_unhealthy() {
        let lb = LeastConnections::new();
        let backends = backends(2);
        for b in &backends {
            b.set_healthy(false);
        }
        assert!(lb.next_server(&backends, CLIENT).is_none());
    }
}
