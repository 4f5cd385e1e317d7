//! CORS configuration.

use serde::Deserialize;

/// CORS configuration. Absent entirely means permissive (any origin).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins. An empty list means any origin is allowed.
    pub allow_origins: Vec<String>,
    /// Allowed HTTP methods.
    pub allow_methods: Vec<String>,
    /// Allowed request headers.
    pub allow_headers: Vec<String>,
    /// Whether credentials (cookies, authorization headers) are allowed.
    pub allow_credentials: bool,
    /// `Access-Control-Max-Age` in seconds.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            allow_methods: Vec::new(),
            allow_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }
}
