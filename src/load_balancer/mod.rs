//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Client identifier
//!     → affinity.rs (reuse the remembered backend if healthy)
//!     → otherwise apply the configured algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick the healthy backend with fewest connections)
//!     → affinity.rs records the new choice
//!     → backend.rs (connection guard tracks load while forwarding)
//! ```
//!
//! # Design Decisions
//! - Algorithms are stateless apart from the round-robin counter
//! - pool.rs owns health flags and load counters as atomics
//! - The algorithm is chosen once at startup

pub mod affinity;
pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

use std::net::IpAddr;
use std::sync::Arc;

use crate::config::LbMethod;
use backend::Backend;

pub use affinity::{AffinityTable, StickySelector};
pub use pool::BackendRegistry;

/// A backend selection algorithm.
///
/// `client` is passed so affinity can be layered on top; implementations
/// do not persist anything per client.
pub trait LoadBalancer: Send + Sync {
    fn next_server(&self, backends: &[Arc<Backend>], client: IpAddr) -> Option<Arc<Backend>>;
}

/// Build the algorithm named in configuration.
pub fn from_method(method: LbMethod) -> Box<dyn LoadBalancer> {
    match method {
        LbMethod::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        LbMethod::LeastConn => Box::new(least_conn::LeastConnections::new()),
    }
}
