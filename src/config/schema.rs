//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Frontend listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Backend selection policy.
    pub balancer: BalancerConfig,

    /// Backend server definitions, in selection order.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Per-client rate limiting and penalty box.
    pub rate_limit: RateLimitConfig,

    /// Request/response size limits.
    pub limits: LimitsConfig,

    /// Optional socket deadlines.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Startup/shutdown behavior.
    pub lifecycle: LifecycleConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS listener, run alongside the plain one.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections per listener. Unbounded when unset.
    pub max_connections: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: None,
        }
    }
}

/// TLS configuration for the encrypted listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    /// Bind address of the TLS listener.
    #[serde(default = "default_tls_bind_address")]
    pub bind_address: String,
}

fn default_tls_bind_address() -> String {
    "0.0.0.0:8443".to_string()
}

/// Load balancing method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum LbMethod {
    #[serde(rename = "round_robin")]
    RoundRobin,
    #[default]
    #[serde(rename = "leastconn")]
    LeastConn,
}

impl std::fmt::Display for LbMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LbMethod::RoundRobin => write!(f, "round_robin"),
            LbMethod::LeastConn => write!(f, "leastconn"),
        }
    }
}

/// Backend selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Algorithm used when a client has no usable affinity.
    pub method: LbMethod,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Probe connect timeout in seconds.
    pub timeout_secs: u64,

    /// Mark a backend unhealthy as soon as a forwarded connection fails to reach it.
    pub mark_unhealthy_on_connect_failure: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            timeout_secs: 2,
            mark_unhealthy_on_connect_failure: true,
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sliding window length in seconds.
    pub period_secs: u64,

    /// Requests allowed per client inside one window.
    pub max_requests: usize,

    /// How long a client stays blocked after exceeding the limit, in seconds.
    pub penalty_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            period_secs: 2,
            max_requests: 6,
            penalty_secs: 5,
        }
    }
}

/// Size limits for proxied traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Bytes read from the client for the single request unit.
    pub max_request_bytes: usize,

    /// Cap on the buffered backend response.
    pub max_response_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: 1024,
            max_response_bytes: 100_000_000,
        }
    }
}

/// Socket deadlines. All unset by default.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each client read/write and the TLS handshake.
    pub client_io_secs: Option<u64>,

    /// Deadline for establishing the backend connection.
    pub backend_connect_secs: Option<u64>,

    /// Deadline for each backend read/write.
    pub backend_io_secs: Option<u64>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Time in-flight connections get to finish after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [listener.tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [balancer]
            method = "round_robin"

            [[backends]]
            name = "web1"
            address = "10.0.0.1:8000"

            [[backends]]
            name = "web2"
            address = "10.0.0.2:8000"

            [rate_limit]
            period_secs = 2
            max_requests = 3
            penalty_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.balancer.method, LbMethod::RoundRobin);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].name, "web2");
        assert_eq!(config.rate_limit.max_requests, 3);
        let tls = config.listener.tls.unwrap();
        assert_eq!(tls.bind_address, "0.0.0.0:8443");
        // untouched sections keep their defaults
        assert_eq!(config.health_check.interval_secs, 5);
        assert_eq!(config.health_check.timeout_secs, 2);
        assert_eq!(config.limits.max_request_bytes, 1024);
        assert!(config.timeouts.client_io_secs.is_none());
    }

    #[test]
    fn rejects_unknown_method() {
        let result: Result<ProxyConfig, _> = toml::from_str(
            r#"
            [balancer]
            method = "random"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn method_defaults_to_leastconn() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.balancer.method, LbMethod::LeastConn);
        assert_eq!(config.balancer.method.to_string(), "leastconn");
    }
}
