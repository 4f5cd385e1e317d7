//! Health check endpoint configuration.

use std::net::SocketAddr;

use serde::Deserialize;

fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/health".to_string()
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bind the health endpoint on a separate listen address instead of
    /// mounting it on the main server.
    #[serde(default)]
    pub listen: Option<SocketAddr>,
    /// Path the health endpoint is served under, when not on a separate
    /// listen address.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen: None,
            path: default_path(),
        }
    }
}
