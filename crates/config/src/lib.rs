//! Configuration structures mapping the gateway's TOML configuration file.

#![deny(missing_docs)]

mod accounting;
mod cors;
mod headers;
mod health;
mod llm;
mod loader;
mod server;
mod tls;

use std::path::Path;

pub use accounting::{AuthorizationConfig, ModelCatalogConfig, PricingConfig, UsageConfig};
pub use cors::*;
pub use headers::{HeaderForward, HeaderInsert, HeaderRemove, HeaderRenameDuplicate, HeaderRule};
pub use health::HealthConfig;
pub use llm::{
    AnthropicProtocolConfig, ApiModelConfig, ApiProviderConfig, LlmConfig, LlmProtocol, LlmProtocolsConfig,
    LlmProviderConfig, ModelConfig, ModelFilter, OpenAIProtocolConfig, ProviderType, ResponsesProtocolConfig,
    SELECTION_RULE_ORDER,
};
use serde::Deserialize;
pub use server::ServerConfig;
pub use tls::TlsServerConfig;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// LLM configuration settings.
    pub llm: LlmConfig,
    /// Pricing catalog configuration.
    pub pricing: PricingConfig,
    /// Model catalog configuration.
    pub model_catalog: ModelCatalogConfig,
    /// Usage accounting persistence configuration.
    pub usage: UsageConfig,
    /// Trust-root authorization adapter configuration.
    pub authorization: AuthorizationConfig,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates that the configuration has at least one functional downstream.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate_has_downstreams(self)
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;

    use crate::Config;

    #[test]
    fn defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        Config {
            server: ServerConfig {
                listen_address: None,
                tls: None,
                health: HealthConfig {
                    enabled: true,
                    listen: None,
                    path: "/health",
                },
                cors: None,
            },
            llm: LlmConfig {
                enabled: true,
                protocols: LlmProtocolsConfig {
                    openai: OpenAIProtocolConfig {
                        enabled: true,
                        path: "",
                    },
                    anthropic: AnthropicProtocolConfig {
                        enabled: true,
                        path: "",
                    },
                    responses: ResponsesProtocolConfig {
                        enabled: true,
                        path: "",
                    },
                },
                providers: {},
            },
            pricing: PricingConfig {
                directory: "./pricing",
            },
            model_catalog: ModelCatalogConfig {
                directory: "./model-catalog",
            },
            usage: UsageConfig {
                db_path: "./usage.db",
            },
            authorization: AuthorizationConfig {
                enabled: false,
                trust_root_url: None,
                decryption_key: None,
            },
        }
        "#);
    }
}
