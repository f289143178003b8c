//! TLS configuration and certificate loading.

use std::path::Path;
use std::sync::Arc;
use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

/// Only HTTP/1 bytes are relayed, so nothing else may be negotiated.
const ALPN_HTTP_1_1: &[u8] = b"http/1.1";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Certificate file not found: {0}")]
    CertificateNotFound(String),

    #[error("Private key file not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to load certificate/key pair: {0}")]
    Load(#[from] std::io::Error),
}

/// Load a certificate/key pair (PEM) into an acceptor for raw TCP streams.
pub async fn load_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    if !cert_path.exists() {
        return Err(TlsError::CertificateNotFound(cert_path.display().to_string()));
    }
    if !key_path.exists() {
        return Err(TlsError::KeyNotFound(key_path.display().to_string()));
    }

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    // axum-server advertises h2 as well
    let mut server_config = (*config.get_inner()).clone();
    server_config.alpn_protocols = vec![ALPN_HTTP_1_1.to_vec()];

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
