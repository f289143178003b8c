//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP/TLS stream
//!     → server.rs (accept loops, one task per connection)
//!     → dispatcher.rs (admission, backend choice, forwarding)
//!     → request.rs (request line extraction for logging)
//!     → response.rs (status lines for rejections)
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{ConnectionDispatcher, DispatchError};
pub use server::{Server, TlsFrontend};
