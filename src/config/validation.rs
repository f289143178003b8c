//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (periods > 0, limits > 0, ports valid)
//! - Detect duplicate backend names and conflicting listener addresses
//!
//! Returns all validation errors, not just the first.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{name}' has invalid address '{address}' (expected host:port)")]
    InvalidBackendAddress { name: String, address: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("TLS listener must not share the plain listener address '{0}'")]
    TlsAddressConflict(String),
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if !is_host_port(&backend.address) {
            errors.push(ValidationError::InvalidBackendAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
            });
        }
    }

    let positive = [
        ("rate_limit.period_secs", config.rate_limit.period_secs as u128),
        ("rate_limit.max_requests", config.rate_limit.max_requests as u128),
        ("limits.max_request_bytes", config.limits.max_request_bytes as u128),
        ("limits.max_response_bytes", config.limits.max_response_bytes as u128),
        ("health_check.interval_secs", config.health_check.interval_secs as u128),
        ("health_check.timeout_secs", config.health_check.timeout_secs as u128),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if let Some(tls) = &config.listener.tls {
        if tls.bind_address == config.listener.bind_address {
            errors.push(ValidationError::TlsAddressConflict(tls.bind_address.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{BackendConfig, TlsConfig};

    fn backend(name: &str, address: &str) -> BackendConfig {
        BackendConfig {
            name: name.into(),
            address: address.into(),
        }
    }

    #[test]
    fn accepts_minimal_config() {
        let mut config = ProxyConfig::default();
        config.backends.push(backend("web1", "localhost:8000"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ProxyConfig::default();
        config.backends.push(backend("web1", "10.0.0.1:8000"));
        config.backends.push(backend("web1", "10.0.0.2"));
        config.rate_limit.max_requests = 0;
        config.listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
            bind_address: config.listener.bind_address.clone(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::DuplicateBackend("web1".into())));
        assert!(errors.contains(&ValidationError::Zero("rate_limit.max_requests")));
    }

    #[test]
    fn empty_backend_list_is_rejected() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }

    #[test]
    fn host_port_parsing() {
        assert!(is_host_port("127.0.0.1:80"));
        assert!(is_host_port("backend.internal:8080"));
        assert!(!is_host_port(":80"));
        assert!(!is_host_port("host:http"));
        assert!(!is_host_port("host:70000"));
    }
}
