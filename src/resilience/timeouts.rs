//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap socket operations with an optional deadline
//! - Turn an elapsed deadline into `io::ErrorKind::TimedOut`
//!
//! Deadlines are opt-in: with no limit configured the operation runs unbounded.

use std::future::Future;
use std::io;
use std::time::Duration;

use crate::config::TimeoutConfig;

/// Deadlines applied by the dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoTimeouts {
    pub client_io: Option<Duration>,
    pub backend_connect: Option<Duration>,
    pub backend_io: Option<Duration>,
}

impl From<&TimeoutConfig> for IoTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            client_io: config.client_io_secs.map(Duration::from_secs),
            backend_connect: config.backend_connect_secs.map(Duration::from_secs),
            backend_io: config.backend_io_secs.map(Duration::from_secs),
        }
    }
}

/// Run `fut`, failing with `TimedOut` if `limit` elapses first.
pub async fn with_deadline<F, T>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            io::Error::new(io::ErrorKind::TimedOut, format!("operation timed out after {limit:?}"))
        })?,
        None => fut.await,
    }
}
