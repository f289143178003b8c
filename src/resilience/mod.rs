//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client or backend socket operation:
//!     → timeouts.rs (optional deadline)
//!     → On failure: connection aborted, no retry
//! ```
//!
//! # Design Decisions
//! - No automatic retries: a failed backend attempt is never replayed
//!   against another backend within the same request
//! - Deadlines are configurable and off by default

pub mod timeouts;
