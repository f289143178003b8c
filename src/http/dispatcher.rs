//! Per-connection request dispatch.
//!
//! # Responsibilities
//! - Admission: penalty box, then sliding-window rate limit
//! - Backend resolution through sticky affinity
//! - Forward exactly one request and its response, byte for byte
//! - Keep the backend load counter balanced on every exit path: the load
//!   is taken as soon as a backend is selected and released when dispatch ends
//!
//! # Flow
//! ```text
//! penalty check ─▶ resolve backend ─▶ read request ─▶ rate limit
//!     ─▶ connect backend ─▶ forward request ─▶ relay response ─▶ close
//! ```
//! Any step may end the connection with a bare status line; I/O failures
//! just close both sockets. Nothing is retried. The response is streamed to
//! the client as it arrives, up to the configured cap.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::{LimitsConfig, ProxyConfig};
use crate::http::request::RequestLine;
use crate::http::response::Rejection;
use crate::load_balancer::{self, BackendRegistry, StickySelector};
use crate::observability::metrics;
use crate::resilience::timeouts::{with_deadline, IoTimeouts};
use crate::security::{Admission, AdmissionControl};

/// Why a connection did not complete a request/response cycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("client is under penalty")]
    Penalized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("no healthy backend available")]
    NoBackendAvailable,

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("failed to connect to backend {backend}: {source}")]
    BackendConnect {
        backend: String,
        #[source]
        source: io::Error,
    },

    #[error("client I/O failed: {0}")]
    ClientIo(#[source] io::Error),

    #[error("backend I/O failed: {0}")]
    BackendIo(#[source] io::Error),
}

impl DispatchError {
    /// The status line owed to the client, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            DispatchError::Penalized | DispatchError::RateLimited => Some(Rejection::Forbidden),
            DispatchError::MalformedRequest(_) => Some(Rejection::BadRequest),
            DispatchError::NoBackendAvailable | DispatchError::BackendConnect { .. } => {
                Some(Rejection::ServiceUnavailable)
            }
            DispatchError::ClientIo(_) | DispatchError::BackendIo(_) => None,
        }
    }

    /// Metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::Penalized => "penalized",
            DispatchError::RateLimited => "rate_limited",
            DispatchError::NoBackendAvailable => "no_backend",
            DispatchError::MalformedRequest(_) => "malformed_request",
            DispatchError::BackendConnect { .. } => "backend_connect",
            DispatchError::ClientIo(_) => "client_io",
            DispatchError::BackendIo(_) => "backend_io",
        }
    }
}

/// Shared dispatch logic for every listener.
#[derive(Debug)]
pub struct ConnectionDispatcher {
    registry: Arc<BackendRegistry>,
    selector: StickySelector,
    admission: AdmissionControl,
    limits: LimitsConfig,
    timeouts: IoTimeouts,
    mark_unhealthy_on_connect_failure: bool,
}

impl ConnectionDispatcher {
    pub fn new(config: &ProxyConfig, registry: Arc<BackendRegistry>) -> Self {
        let policy = load_balancer::from_method(config.balancer.method);
        Self {
            selector: StickySelector::new(registry.clone(), policy),
            registry,
            admission: AdmissionControl::new(&config.rate_limit),
            limits: config.limits.clone(),
            timeouts: IoTimeouts::from(&config.timeouts),
            mark_unhealthy_on_connect_failure: config.health_check.mark_unhealthy_on_connect_failure,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn selector(&self) -> &StickySelector {
        &self.selector
    }

    pub fn admission(&self) -> &AdmissionControl {
        &self.admission
    }

    /// Serve one accepted connection to completion, then close it.
    pub async fn handle<S>(&self, mut client: S, client_ip: IpAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Instant::now();

        match self.dispatch(&mut client, client_ip).await {
            Ok(backend) => {
                metrics::record_request(&backend, start);
                tracing::info!(
                    client = %client_ip,
                    backend = %backend,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Request completed"
                );
            }
            Err(e) => {
                metrics::record_rejection(e.reason());
                match e.rejection() {
                    Some(rejection) => {
                        if matches!(e, DispatchError::BackendConnect { .. }) {
                            tracing::error!(client = %client_ip, status = rejection.status(), error = %e, "Request rejected");
                        } else {
                            tracing::info!(client = %client_ip, status = rejection.status(), error = %e, "Request rejected");
                        }
                        let written =
                            with_deadline(self.timeouts.client_io, client.write_all(rejection.as_bytes())).await;
                        if let Err(write_err) = written {
                            tracing::debug!(client = %client_ip, error = %write_err, "Failed to send rejection");
                        }
                    }
                    None => {
                        tracing::warn!(client = %client_ip, error = %e, "Connection aborted");
                    }
                }
            }
        }

        let _ = with_deadline(self.timeouts.client_io, client.shutdown()).await;
    }

    /// Run the dispatch steps, returning the name of the backend that served the request.
    pub async fn dispatch<S>(&self, client: &mut S, client_ip: IpAddr) -> Result<String, DispatchError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some(until) = self.admission.check_penalty(client_ip) {
            tracing::info!(
                client = %client_ip,
                remaining_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Request from client is still under penalty"
            );
            return Err(DispatchError::Penalized);
        }

        let backend = self
            .selector
            .resolve(client_ip)
            .ok_or(DispatchError::NoBackendAvailable)?;
        // counted from selection on, so concurrent picks see each other
        let _load = backend.acquire();
        tracing::info!(client = %client_ip, backend = %backend.name(), "Request goes to backend server");

        let mut buf = vec![0u8; self.limits.max_request_bytes];
        let n = with_deadline(self.timeouts.client_io, client.read(&mut buf))
            .await
            .map_err(DispatchError::ClientIo)?;
        let request = &buf[..n];

        let line = RequestLine::parse(request).map_err(DispatchError::MalformedRequest)?;
        tracing::info!(client = %client_ip, method = %line.method, path = %line.path, "Request received");

        match self.admission.admit(client_ip) {
            Admission::Admitted => {}
            Admission::Penalized { .. } => return Err(DispatchError::Penalized),
            Admission::RateLimited { .. } => return Err(DispatchError::RateLimited),
        }

        let connect = TcpStream::connect(backend.address());
        let mut upstream = match with_deadline(self.timeouts.backend_connect, connect).await {
            Ok(stream) => stream,
            Err(source) => {
                if self.mark_unhealthy_on_connect_failure && backend.set_healthy(false) {
                    tracing::warn!(backend = %backend.name(), "Backend marked unhealthy after connect failure");
                    metrics::record_backend_health(backend.name(), false);
                }
                return Err(DispatchError::BackendConnect {
                    backend: backend.name().to_string(),
                    source,
                });
            }
        };

        with_deadline(self.timeouts.backend_io, upstream.write_all(request))
            .await
            .map_err(DispatchError::BackendIo)?;
        // half-close: keep-alive backends close once they see the end of the request
        with_deadline(self.timeouts.backend_io, upstream.shutdown())
            .await
            .map_err(DispatchError::BackendIo)?;

        let mut capped = (&mut upstream).take(self.limits.max_response_bytes);
        let relayed = with_deadline(self.timeouts.backend_io, tokio::io::copy(&mut capped, client))
            .await
            .map_err(DispatchError::BackendIo)?;
        with_deadline(self.timeouts.client_io, client.flush())
            .await
            .map_err(DispatchError::ClientIo)?;

        tracing::debug!(client = %client_ip, backend = %backend.name(), bytes = relayed, "Response relayed");
        Ok(backend.name().to_string())
    }
}
