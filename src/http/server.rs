//! Frontend server.
//!
//! # Responsibilities
//! - Build the shared state (registry, dispatcher) from configuration
//! - Run the plain and TLS accept loops as independent tasks
//! - Spawn one task per accepted connection
//! - Run the health monitor and the rate limit sweeper alongside the listeners

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::dispatcher::ConnectionDispatcher;
use crate::lifecycle::Shutdown;
use crate::load_balancer::BackendRegistry;
use crate::net::connection::ConnectionTracker;
use crate::net::Listener;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// A bound TLS listener with its acceptor.
pub struct TlsFrontend {
    pub listener: Listener,
    pub acceptor: TlsAcceptor,
}

/// The load balancer frontend.
pub struct Server {
    config: ProxyConfig,
    registry: Arc<BackendRegistry>,
    dispatcher: Arc<ConnectionDispatcher>,
    tracker: ConnectionTracker,
}

impl Server {
    /// Create a new server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let registry = Arc::new(BackendRegistry::new(&config.backends));
        let dispatcher = Arc::new(ConnectionDispatcher::new(&config, registry.clone()));

        tracing::info!(
            backends = registry.len(),
            method = %config.balancer.method,
            "Backend registry initialized"
        );

        Self {
            config,
            registry,
            dispatcher,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.clone()
    }

    pub fn dispatcher(&self) -> Arc<ConnectionDispatcher> {
        self.dispatcher.clone()
    }

    /// Tracker of in-flight connections, for draining on shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run until `shutdown` fires. Returns once every accept loop has stopped.
    pub async fn run(self, plain: Listener, tls: Option<TlsFrontend>, shutdown: &Shutdown) {
        let mut tasks = JoinSet::new();

        let monitor = HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
        tokio::spawn(monitor.run(shutdown.subscribe()));
        tokio::spawn(sweep_admission_state(
            self.dispatcher.clone(),
            Duration::from_secs(self.config.rate_limit.period_secs.max(1)),
            shutdown.subscribe(),
        ));

        tasks.spawn(accept_loop(
            plain,
            None,
            self.dispatcher.clone(),
            self.tracker.clone(),
            self.handshake_timeout(),
            shutdown.subscribe(),
        ));

        match tls {
            Some(frontend) => {
                tasks.spawn(accept_loop(
                    frontend.listener,
                    Some(frontend.acceptor),
                    self.dispatcher.clone(),
                    self.tracker.clone(),
                    self.handshake_timeout(),
                    shutdown.subscribe(),
                ));
            }
            None => tracing::info!("TLS not configured, HTTPS not enabled"),
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Accept loop terminated abnormally");
            }
        }

        tracing::info!("Listeners stopped");
    }

    fn handshake_timeout(&self) -> Option<Duration> {
        self.config.timeouts.client_io_secs.map(Duration::from_secs)
    }
}

async fn accept_loop(
    listener: Listener,
    tls: Option<TlsAcceptor>,
    dispatcher: Arc<ConnectionDispatcher>,
    tracker: ConnectionTracker,
    handshake_timeout: Option<Duration>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let scheme: &'static str = if tls.is_some() { "https" } else { "http" };
    match listener.local_addr() {
        Ok(addr) => tracing::info!(address = %addr, scheme, "Load balancer listening"),
        Err(e) => tracing::warn!(error = %e, scheme, "Listener has no local address"),
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer, permit) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!(error = %e, scheme, "Accept failed");
                        // avoid spinning on persistent errors such as fd exhaustion
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                };

                metrics::record_accept(scheme);
                let guard = tracker.track();
                tracing::info!(connection_id = %guard.id(), peer = %peer, scheme, "Accepted connection");

                let dispatcher = dispatcher.clone();
                let tls = tls.clone();
                let span = tracing::info_span!("connection", id = %guard.id(), scheme);
                tokio::spawn(
                    async move {
                        let _permit = permit;
                        let _guard = guard;
                        serve(stream, peer, tls, handshake_timeout, &dispatcher).await;
                    }
                    .instrument(span),
                );
            }
            _ = shutdown.recv() => {
                tracing::info!(scheme, "Listener received shutdown signal, no longer accepting");
                break;
            }
        }
    }
}

/// Periodically forget clients with no live rate window or penalty.
async fn sweep_admission_state(
    dispatcher: Arc<ConnectionDispatcher>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let purged = dispatcher.admission().purge_expired();
                if purged > 0 {
                    let tracked = dispatcher.admission().tracked_clients();
                    tracing::debug!(purged, tracked, "Purged idle rate limit windows");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
    handshake_timeout: Option<Duration>,
    dispatcher: &ConnectionDispatcher,
) {
    match tls {
        Some(acceptor) => match with_deadline(handshake_timeout, acceptor.accept(stream)).await {
            Ok(tls_stream) => dispatcher.handle(tls_stream, peer.ip()).await,
            Err(e) => tracing::warn!(peer = %peer, error = %e, "TLS handshake failed"),
        },
        None => dispatcher.handle(stream, peer.ip()).await,
    }
}
