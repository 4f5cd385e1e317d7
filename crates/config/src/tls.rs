//! TLS configuration for the HTTP server.

use std::path::PathBuf;

use serde::Deserialize;

/// TLS certificate and key paths for serving HTTPS directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsServerConfig {
    /// Path to the PEM-encoded certificate chain.
    pub certificate: PathBuf,
    /// Path to the PEM-encoded private key.
    pub key: PathBuf,
}
