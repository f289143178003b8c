//! Metrics collection and exposition.
//!
//! # Metrics
//! - `simplelb_connections_accepted_total` (counter): accepted connections by listener
//! - `simplelb_requests_total` (counter): forwarded requests by backend
//! - `simplelb_rejections_total` (counter): rejected connections by reason
//! - `simplelb_penalties_total` (counter): penalty box transitions
//! - `simplelb_request_duration_seconds` (histogram): forward latency by backend
//! - `simplelb_backend_active_connections` (gauge): current load per backend
//! - `simplelb_backend_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_accept(listener: &'static str) {
    counter!("simplelb_connections_accepted_total", "listener" => listener).increment(1);
}

pub fn record_request(backend: &str, start: Instant) {
    counter!("simplelb_requests_total", "backend" => backend.to_string()).increment(1);
    histogram!("simplelb_request_duration_seconds", "backend" => backend.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("simplelb_rejections_total", "reason" => reason).increment(1);
}

pub fn record_penalty() {
    counter!("simplelb_penalties_total").increment(1);
}

pub fn record_backend_load(backend: &str, active: usize) {
    gauge!("simplelb_backend_active_connections", "backend" => backend.to_string())
        .set(active as f64);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("simplelb_backend_healthy", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
