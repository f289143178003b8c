//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → TCP connect to each backend
//!     → Update the backend's health flag
//!
//! Connect failures while forwarding (http::dispatcher):
//!     → Mark the backend unhealthy right away
//! ```
//!
//! # Design Decisions
//! - One failed probe marks a backend down, one success brings it back
//! - Probes run independently of request traffic

pub mod active;

pub use active::HealthMonitor;
