//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → rate_limit.rs (penalty box check, before any backend work)
//! Request read:
//!     → rate_limit.rs (sliding-window admission)
//!     → Pass to forwarding
//! ```
//!
//! # Design Decisions
//! - Keyed by client IP, no global budget
//! - Fail closed: a rejected client gets 403 and the connection is closed

pub mod rate_limit;

pub use rate_limit::{Admission, AdmissionControl};
