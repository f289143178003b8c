//! Rejection responses written by the dispatcher itself.
//!
//! Each is a bare status line with no headers and no body.

/// A response generated without contacting a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    BadRequest,
    Forbidden,
    ServiceUnavailable,
}

impl Rejection {
    pub fn status(&self) -> u16 {
        match self {
            Rejection::BadRequest => 400,
            Rejection::Forbidden => 403,
            Rejection::ServiceUnavailable => 503,
        }
    }

    /// The bytes sent on the wire.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Rejection::BadRequest => b"HTTP/1.1 400 Bad Request\r\n\r\n",
            Rejection::Forbidden => b"HTTP/1.1 403 Forbidden\r\n\r\n",
            Rejection::ServiceUnavailable => b"HTTP/1.1 503 Service Unavailable\r\n\r\n",
        }
    }
}
