//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the plain listener
//! - Load the certificate/key pair and bind the TLS listener when configured
//!
//! Fail fast: any startup error is fatal.

use std::path::Path;
use thiserror::Error;

use crate::config::ProxyConfig;
use crate::http::server::TlsFrontend;
use crate::net::tls::{load_tls_acceptor, TlsError};
use crate::net::{Listener, ListenerError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("TLS: {0}")]
    Tls(#[from] TlsError),
}

/// Listeners bound from configuration, ready for `Server::run`.
pub struct Frontends {
    pub plain: Listener,
    pub tls: Option<TlsFrontend>,
}

/// Bind every configured listener.
pub async fn bind_frontends(config: &ProxyConfig) -> Result<Frontends, StartupError> {
    let max_connections = config.listener.max_connections;
    let plain = Listener::bind(&config.listener.bind_address, max_connections).await?;

    let tls = match &config.listener.tls {
        Some(tls) => {
            let acceptor = load_tls_acceptor(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            let listener = Listener::bind(&tls.bind_address, max_connections).await?;
            Some(TlsFrontend { listener, acceptor })
        }
        None => None,
    };

    Ok(Frontends { plain, tls })
}
