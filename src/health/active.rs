//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends with a bare TCP connect
//! - Update backend health state based on results

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::BackendRegistry;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>, config: HealthCheckConfig) -> Self {
        Self { registry, config }
    }

    /// Probe every backend each interval until shutdown. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            backends = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one probe cycle over every backend.
    pub async fn check_all(&self) {
        for backend in self.registry.backends() {
            let result = probe(backend.address(), self.config.timeout()).await;
            self.apply(backend, result);
        }
    }

    fn apply(&self, backend: &Backend, result: io::Result<()>) {
        let healthy = result.is_ok();
        let was_healthy = backend.set_healthy(healthy);

        match result {
            Ok(()) if !was_healthy => {
                tracing::info!(backend = %backend.name(), address = %backend.address(), "Backend restored to healthy");
            }
            Ok(()) => {}
            Err(e) => {
                tracing::error!(
                    backend = %backend.name(),
                    address = %backend.address(),
                    error = %e,
                    "Error connecting to backend server"
                );
                if was_healthy {
                    tracing::warn!(backend = %backend.name(), "Backend marked unhealthy");
                }
            }
        }

        metrics::record_backend_health(backend.name(), healthy);
    }
}

/// Open and immediately drop a TCP connection to `address`.
async fn probe(address: &str, timeout: Duration) -> io::Result<()> {
    with_deadline(Some(timeout), TcpStream::connect(address)).await?;
    Ok(())
}
