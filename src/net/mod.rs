//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, optional connection limit)
//!     → tls.rs (TLS handshake on the encrypted listener)
//!     → connection.rs (lifecycle tracking)
//!     → Hand off to the dispatcher
//! ```
//!
//! # Design Decisions
//! - Plain and TLS listeners are independent tasks sharing one dispatcher
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
pub mod tls;

pub use listener::{Listener, ListenerError};
