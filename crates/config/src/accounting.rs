//! Pricing catalog, model catalog, and usage/budget persistence configuration.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

/// Where the pricing catalog reads its per-provider YAML files from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingConfig {
    /// Directory containing one `<provider>.yaml` file per provider.
    pub directory: PathBuf,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./pricing"),
        }
    }
}

/// Where the model catalog reads its per-dialect JSON files from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelCatalogConfig {
    /// Directory containing `chat_completions.json`, `messages.json`, `responses.json`.
    pub directory: PathBuf,
}

impl Default for ModelCatalogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./model-catalog"),
        }
    }
}

/// Usage accounting persistence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsageConfig {
    /// Path to the embedded relational store file.
    pub db_path: PathBuf,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./usage.db"),
        }
    }
}

/// Trusted-execution authorization adapter configuration. Disabled by default;
/// when enabled, every provider request's API key is retrieved per-request
/// from the trust root instead of from static configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Enables the trust-root authorization path.
    pub enabled: bool,
    /// Base URL of the trust root service, e.g. `https://trust-root.internal`.
    pub trust_root_url: Option<String>,
    /// This gateway's X25519 private key (hex-encoded, 32 bytes) used to
    /// decrypt secret envelopes returned by the trust root.
    pub decryption_key: Option<SecretString>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            trust_root_url: None,
            decryption_key: None,
        }
    }
}
