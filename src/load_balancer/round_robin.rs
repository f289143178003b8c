//! Round-robin load balancing strategy.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
///
/// Health is not consulted here; the sticky wrapper re-checks every pick.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>], _client: IpAddr) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % backends.len();
        Some(backends[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendId;

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        (0..n)
            .map(|i| Arc::new(Backend::new(BackendId(i), format!("b{i}"), format!("127.0.0.1:{}", 8080 + i))))
            .collect()
    }

    const CLIENT: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let backends = backends(3);

        let picks: Vec<_> = (0..6)
            .map(|_| lb.next_server(&backends, CLIENT).unwrap().id().0)
            .collect();
        assert_eq!(picks, [0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn does_not_skip_unhealthy() {
        let lb = RoundRobin::new();
        let backends = backends(2);
        backends[0].set_healthy(false);

        assert_eq!(lb.next_server(&backends, CLIENT).unwrap().id(), BackendId(0));
        assert_eq!(lb.next_server(&backends, CLIENT).unwrap().id(), BackendId(1));
    }

    #[test]
    fn concurrent_picks_are_evenly_spread() {
        let lb = Arc::new(RoundRobin::new());
        let backends = Arc::new(backends(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lb = lb.clone();
                let backends = backends.clone();
                std::thread::spawn(move || {
                    let mut counts = [0usize; 4];
                    for _ in 0..1000 {
                        counts[lb.next_server(&backends, CLIENT).unwrap().id().0] += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut totals = [0usize; 4];
        for handle in handles {
            for (total, count) in totals.iter_mut().zip(handle.join().unwrap()) {
                *total += count;
            }
        }
        assert_eq!(totals, [1000; 4]);
    }

    #[test]
    fn empty_pool() {
        assert!(RoundRobin::new().next_server(&[], CLIENT).is_none());
    }
}
