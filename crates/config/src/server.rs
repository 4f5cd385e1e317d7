//! HTTP server configuration settings.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::{CorsConfig, HealthConfig, TlsServerConfig};

/// HTTP server configuration settings.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// The socket address the server should listen on.
    pub listen_address: Option<SocketAddr>,
    /// TLS configuration for secure connections.
    pub tls: Option<TlsServerConfig>,
    /// Health endpoint configuration.
    pub health: HealthConfig,
    /// CORS configuration. Absent entirely means permissive (any origin).
    pub cors: Option<CorsConfig>,
}
