//! LLM configuration structures for AI model providers.

use std::{borrow::Cow, collections::BTreeMap, fmt};

use indexmap::IndexMap;

use crate::headers::HeaderRule;
use regex::{Regex, RegexBuilder};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Configuration for an individual model within API-based providers.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiModelConfig {
    /// Optional rename - the actual provider model name.
    /// If not specified, the model ID (map key) is used.
    #[serde(default)]
    pub rename: Option<String>,
    /// Header transformation rules for this model.
    #[serde(default)]
    pub headers: Vec<HeaderRule>,
}

/// Unified model configuration, kept as its own enum so pricing/catalog code
/// doesn't need to know about the underlying provider wire dialect.
#[derive(Debug, Clone)]
pub enum ModelConfig {
    /// API-based model configuration (OpenAI, Anthropic, Google, and every
    /// OpenAI-compatible dialect: OpenRouter, xAI, Z.AI, Ollama, generic).
    Api(ApiModelConfig),
}

impl ModelConfig {
    /// Get the optional rename for this model.
    pub fn rename(&self) -> Option<&str> {
        match self {
            Self::Api(config) => config.rename.as_deref(),
        }
    }

    /// Get the headers for this model.
    pub fn headers(&self) -> &[HeaderRule] {
        match self {
            Self::Api(config) => &config.headers,
        }
    }
}

/// Case-insensitive regex filter for matching model identifiers.
#[derive(Clone)]
pub struct ModelFilter {
    regex: Regex,
}

impl ModelFilter {
    /// Create a new validated model filter.
    fn new(pattern: &str) -> Result<Self, String> {
        let trimmed = pattern.trim();

        if trimmed.is_empty() {
            return Err("model_filter cannot be empty".to_string());
        }

        let regex = RegexBuilder::new(trimmed)
            .case_insensitive(true)
            .build()
            .map_err(|err| format!("invalid model_filter regex: {err}"))?;

        Ok(Self { regex })
    }

    /// Return the original pattern string.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Return the compiled regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Check whether the supplied model identifier matches the pattern.
    pub fn is_match(&self, model: &str) -> bool {
        self.regex.is_match(model)
    }
}

/// The order in which rule-matching providers are tried when more than one
/// configured provider's pattern matches a model name (the selection
/// algorithm, step 1). Earlier entries win.
pub const SELECTION_RULE_ORDER: &[ProviderType] = &[
    ProviderType::Anthropic,
    ProviderType::Openai,
    ProviderType::OpenRouter,
    ProviderType::Xai,
    ProviderType::Zai,
    ProviderType::Google,
];

impl fmt::Debug for ModelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFilter").field("pattern", &self.pattern()).finish()
    }
}

impl<'de> Deserialize<'de> for ModelFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = Cow::<'de, str>::deserialize(deserializer)?;
        ModelFilter::new(pattern.as_ref()).map_err(serde::de::Error::custom)
    }
}

/// Protocol type for LLM endpoints.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProtocol {
    /// OpenAI protocol (default).
    OpenAI,
    /// Anthropic protocol.
    Anthropic,
}

impl Default for LlmProtocol {
    fn default() -> Self {
        Self::OpenAI
    }
}

/// OpenAI protocol configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAIProtocolConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for OpenAIProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: String::new(),
        }
    }
}

/// Anthropic protocol configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnthropicProtocolConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for AnthropicProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: String::new(),
        }
    }
}

/// OpenAI Responses protocol configuration (`/v1/responses`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsesProtocolConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for ResponsesProtocolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: String::new(),
        }
    }
}

/// Configuration for all LLM protocol endpoints.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LlmProtocolsConfig {
    /// OpenAI protocol endpoint configuration
    pub openai: OpenAIProtocolConfig,

    /// Anthropic protocol endpoint configuration
    pub anthropic: AnthropicProtocolConfig,

    /// OpenAI Responses protocol endpoint configuration
    pub responses: ResponsesProtocolConfig,
}

/// LLM configuration for AI model integration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Whether the LLM functionality is enabled.
    enabled: bool,

    /// Protocol-specific endpoint configurations.
    pub protocols: LlmProtocolsConfig,

    /// Map of LLM provider configurations.
    pub providers: IndexMap<String, LlmProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            protocols: LlmProtocolsConfig::default(),
            providers: IndexMap::new(),
        }
    }
}

impl LlmConfig {
    /// Whether the LLM functionality is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether there are any LLM providers configured.
    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Whether there are any protocol endpoints enabled.
    pub fn has_protocol_endpoints(&self) -> bool {
        self.protocols.openai.enabled || self.protocols.anthropic.enabled || self.protocols.responses.enabled
    }
}

/// Provider type enumeration.
///
/// `OpenRouter`, `Xai`, `Zai`, `Ollama`, and `OpenAiCompatible` all speak the
/// OpenAI Chat Completions wire dialect and share `OpenAIProvider`; only the
/// default base URL and the name used for pricing/selection differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// OpenAI provider.
    Openai,
    /// Anthropic provider.
    Anthropic,
    /// Google Gemini provider.
    Google,
    /// OpenRouter aggregator (OpenAI-compatible dialect).
    OpenRouter,
    /// xAI (Grok models, OpenAI-compatible dialect).
    Xai,
    /// Z.AI (OpenAI-compatible dialect).
    Zai,
    /// Local Ollama server (OpenAI-compatible dialect).
    Ollama,
    /// Any other OpenAI-compatible endpoint.
    OpenAiCompatible,
}

impl ProviderType {
    /// Default upstream base URL for this provider type, used when the
    /// configuration omits `base_url`. `OpenAiCompatible` has no sensible
    /// default and requires an explicit `base_url`.
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Google => Some("https://generativelanguage.googleapis.com/v1beta"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::Xai => Some("https://api.x.ai/v1"),
            Self::Zai => Some("https://api.z.ai/api/paas/v4"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::OpenAiCompatible => None,
        }
    }

    /// Name used to look up pricing and to key the model catalog; distinct
    /// from the configured provider id so `openai/gpt-4o` and a provider
    /// configured under a custom name both resolve the same pricing entry.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::OpenRouter => "openrouter",
            Self::Xai => "xai",
            Self::Zai => "zai",
            Self::Ollama => "ollama",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }
}

/// Configuration specific to API-based providers.
#[derive(Debug, Clone)]
pub struct ApiProviderConfig {
    /// API key for authentication.
    pub api_key: Option<SecretString>,

    /// Custom base URL for the provider API.
    pub base_url: Option<String>,

    /// Enable token forwarding from user requests.
    pub forward_token: bool,

    /// Regular expression filter for automatically routing models to this provider.
    pub model_filter: Option<ModelFilter>,

    /// Explicitly configured models for this provider.
    pub models: BTreeMap<String, ApiModelConfig>,

    /// Header transformation rules for this provider.
    pub headers: Vec<HeaderRule>,
}

impl<'de> Deserialize<'de> for ApiProviderConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "snake_case")]
        struct ApiProviderConfigSerde {
            #[serde(default)]
            api_key: Option<SecretString>,
            #[serde(default)]
            base_url: Option<String>,
            #[serde(default)]
            forward_token: bool,
            #[serde(default, alias = "model_pattern")]
            model_filter: Option<ModelFilter>,
            #[serde(default)]
            models: BTreeMap<String, ApiModelConfig>,
            #[serde(default)]
            headers: Vec<HeaderRule>,
        }

        let raw = ApiProviderConfigSerde::deserialize(deserializer)?;

        Ok(Self {
            api_key: raw.api_key,
            base_url: raw.base_url,
            forward_token: raw.forward_token,
            model_filter: raw.model_filter,
            models: raw.models,
            headers: raw.headers,
        })
    }
}

/// Complete LLM provider configuration.
///
/// Every variant carries the same `ApiProviderConfig` shape: all supported
/// providers speak HTTPS with a bearer/header-style credential, so
/// there is nothing provider-specific left to model once Bedrock (never part
/// of this gateway's provider list) is gone.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum LlmProviderConfig {
    /// OpenAI provider configuration.
    Openai(ApiProviderConfig),

    /// Anthropic provider configuration.
    Anthropic(ApiProviderConfig),

    /// Google Gemini provider configuration.
    Google(ApiProviderConfig),

    /// OpenRouter aggregator configuration (OpenAI-compatible dialect).
    OpenRouter(ApiProviderConfig),

    /// xAI (Grok) provider configuration (OpenAI-compatible dialect).
    Xai(ApiProviderConfig),

    /// Z.AI provider configuration (OpenAI-compatible dialect).
    Zai(ApiProviderConfig),

    /// Local Ollama server configuration (OpenAI-compatible dialect).
    Ollama(ApiProviderConfig),

    /// Any other OpenAI-compatible endpoint; `base_url` is required.
    OpenAiCompatible(ApiProviderConfig),
}

impl LlmProviderConfig {
    fn api_config(&self) -> &ApiProviderConfig {
        match self {
            Self::Openai(config)
            | Self::Anthropic(config)
            | Self::Google(config)
            | Self::OpenRouter(config)
            | Self::Xai(config)
            | Self::Zai(config)
            | Self::Ollama(config)
            | Self::OpenAiCompatible(config) => config,
        }
    }

    /// Get the provider type for this configuration.
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::Openai(_) => ProviderType::Openai,
            Self::Anthropic(_) => ProviderType::Anthropic,
            Self::Google(_) => ProviderType::Google,
            Self::OpenRouter(_) => ProviderType::OpenRouter,
            Self::Xai(_) => ProviderType::Xai,
            Self::Zai(_) => ProviderType::Zai,
            Self::Ollama(_) => ProviderType::Ollama,
            Self::OpenAiCompatible(_) => ProviderType::OpenAiCompatible,
        }
    }

    /// Get the API key.
    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_config().api_key.as_ref()
    }

    /// Get the base URL, falling back to the provider type's default.
    pub fn base_url(&self) -> Option<&str> {
        self.api_config()
            .base_url
            .as_deref()
            .or_else(|| self.provider_type().default_base_url())
    }

    /// Get the configured model filter for this provider, if any.
    pub fn model_filter(&self) -> Option<&ModelFilter> {
        self.api_config().model_filter.as_ref()
    }

    /// Alias for [`Self::model_filter`] matching the "selection rule"
    /// vocabulary.
    pub fn model_pattern(&self) -> Option<&ModelFilter> {
        self.model_filter()
    }

    /// Check if token forwarding is enabled.
    pub fn forward_token(&self) -> bool {
        self.api_config().forward_token
    }

    /// Get the configured models for this provider as unified ModelConfig.
    pub fn models(&self) -> BTreeMap<String, ModelConfig> {
        self.api_config()
            .models
            .iter()
            .map(|(k, v)| (k.clone(), ModelConfig::Api(v.clone())))
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    #[test]
    fn llm_config_defaults() {
        let config: LlmConfig = toml::from_str("").unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
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
        }
        "#);
    }

    #[test]
    fn llm_config_with_openai() {
        let config = indoc! {r#"
            enabled = true

            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.openai]
            type = "openai"
            api_key = "${OPENAI_API_KEY}"

            [providers.openai.models.gpt-4]

            [providers.openai.models.gpt-3-5-turbo]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gpt-3-5-turbo": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                            "gpt-4": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_with_anthropic() {
        let config = indoc! {r#"
            enabled = true

            [protocols.anthropic]
            enabled = true
            path = "/llm"

            [providers.anthropic]
            type = "anthropic"
            api_key = "{{ env.ANTHROPIC_API_KEY }}"

            [providers.anthropic.models.claude-3-opus]

            [providers.anthropic.models.claude-3-sonnet]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "",
                },
                anthropic: AnthropicProtocolConfig {
                    enabled: true,
                    path: "/llm",
                },
                responses: ResponsesProtocolConfig {
                    enabled: true,
                    path: "",
                },
            },
            providers: {
                "anthropic": Anthropic(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "claude-3-opus": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                            "claude-3-sonnet": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_with_google() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.google]
            type = "google"
            api_key = "{{ env.GOOGLE_KEY }}"

            [providers.google.models.gemini-pro]

            [providers.google.models.gemini-pro-vision]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "google": Google(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gemini-pro": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                            "gemini-pro-vision": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_with_multiple_providers() {
        let config = indoc! {r#"
            enabled = true

            [protocols.openai]
            enabled = true
            path = "/ai"

            [providers.openai]
            type = "openai"
            api_key = "${OPENAI_API_KEY}"

            [providers.openai.models.gpt-4]

            [providers.anthropic]
            type = "anthropic"
            api_key = "{{ env.ANTHROPIC_API_KEY }}"

            [providers.anthropic.models.claude-3-opus]

            [providers.google]
            type = "google"
            api_key = "{{ env.GOOGLE_KEY }}"

            [providers.google.models.gemini-pro]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/ai",
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
            providers: {
                "anthropic": Anthropic(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "claude-3-opus": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
                "google": Google(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gemini-pro": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gpt-4": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_with_model_filter_only() {
        let config = indoc! {r#"
            enabled = true

            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_filter = "^claude-.*"
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        let provider = config.providers.get("anthropic").unwrap();
        let pattern = provider.model_filter().unwrap();
        assert_eq!(pattern.pattern(), "^claude-.*");
        assert!(pattern.is_match("CLAUDE-3-OPUS"));
        assert!(provider.models().is_empty());
    }

    #[test]
    fn llm_config_rejects_empty_model_filter() {
        let config = indoc! {r#"
            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_filter = ""
        "#};

        let err = toml::from_str::<LlmConfig>(config).unwrap_err();
        assert!(err.to_string().contains("model_filter cannot be empty"));
    }

    #[test]
    fn llm_config_allows_model_filter_with_slash() {
        let config = indoc! {r#"
            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_filter = "anthropic/claude"
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();
        let provider = config.providers.get("anthropic").unwrap();
        let filter = provider.model_filter().expect("filter missing");
        assert!(filter.is_match("anthropic/claude"));
    }

    #[test]
    fn llm_config_rejects_invalid_regex_model_filter() {
        let config = indoc! {r#"
            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_filter = "["
        "#};

        let err = toml::from_str::<LlmConfig>(config).unwrap_err();
        assert!(err.to_string().contains("invalid model_filter regex"));
    }

    #[test]
    fn llm_config_accepts_openai_compatible_family() {
        let config = indoc! {r#"
            [providers.openrouter]
            type = "open-router"
            api_key = "test"

            [providers.xai]
            type = "xai"
            api_key = "test"

            [providers.local]
            type = "open-ai-compatible"
            api_key = "test"
            base_url = "http://localhost:8000/v1"
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_eq!(config.providers["openrouter"].base_url(), Some("https://openrouter.ai/api/v1"));
        assert_eq!(config.providers["xai"].base_url(), Some("https://api.x.ai/v1"));
        assert_eq!(config.providers["local"].base_url(), Some("http://localhost:8000/v1"));
    }

    #[test]
    fn model_pattern_is_an_alias_for_model_filter() {
        let config = indoc! {r#"
            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_pattern = "^claude-.*"
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();
        let provider = config.providers.get("anthropic").unwrap();
        assert!(provider.model_pattern().unwrap().is_match("claude-3-opus"));
    }

    #[test]
    fn llm_config_disabled() {
        let config = indoc! {r#"
            enabled = false
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: false,
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
        }
        "#);
    }

    #[test]
    fn llm_config_custom_path() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/models"
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/models",
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
        }
        "#);
    }

    #[test]
    fn llm_config_invalid_provider_type() {
        let config = indoc! {r#"
            [providers.invalid]
            type = "unknown-provider"
            api_key = "key"
        "#};

        let result: Result<LlmConfig, _> = toml::from_str(config);
        assert!(result.is_err());

        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.contains("unknown variant"));
    }

    #[test]
    fn llm_config_with_static_api_key() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.openai]
            type = "openai"
            api_key = "sk-1234567890abcdef"

            [providers.openai.models.gpt-4]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gpt-4": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_with_explicit_models() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.openai]
            type = "openai"
            api_key = "key"

            [providers.openai.models.gpt-4]
            rename = "gpt-4-turbo-preview"

            [providers.openai.models.gpt-3-5]
            rename = "gpt-3.5-turbo"
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gpt-3-5": ApiModelConfig {
                                rename: Some(
                                    "gpt-3.5-turbo",
                                ),
                                headers: [],
                            },
                            "gpt-4": ApiModelConfig {
                                rename: Some(
                                    "gpt-4-turbo-preview",
                                ),
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_models_without_rename() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.openai]
            type = "openai"
            api_key = "key"

            [providers.openai.models.gpt-4]
            # No rename - will use "gpt-4" as-is

            [providers.openai.models.custom-model]
            # No fields at all
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "custom-model": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                            "gpt-4": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_mixed_providers_with_models() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.openai]
            type = "openai"
            api_key = "key1"

            [providers.openai.models.gpt-4]
            rename = "gpt-4-turbo"

            [providers.anthropic]
            type = "anthropic"
            api_key = "key2"

            [providers.anthropic.models.claude-3]
            rename = "claude-3-opus-20240229"

            [providers.anthropic.models.claude-instant]
            # No rename
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "anthropic": Anthropic(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "claude-3": ApiModelConfig {
                                rename: Some(
                                    "claude-3-opus-20240229",
                                ),
                                headers: [],
                            },
                            "claude-instant": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gpt-4": ApiModelConfig {
                                rename: Some(
                                    "gpt-4-turbo",
                                ),
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_with_forward_token_enabled() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [providers.openai]
            type = "openai"
            api_key = "sk-fallback-key"
            forward_token = true

            [providers.openai.models.gpt-4]

            [providers.anthropic]
            type = "anthropic"
            forward_token = true
            # No api_key provided - relies entirely on token forwarding

            [providers.anthropic.models.claude-3-opus]

            [providers.google]
            type = "google"
            api_key = "{{ env.GOOGLE_KEY }}"
            forward_token = false # Explicitly disabled

            [providers.google.models.gemini-pro]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
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
            providers: {
                "anthropic": Anthropic(
                    ApiProviderConfig {
                        api_key: None,
                        base_url: None,
                        forward_token: true,
                        model_filter: None,
                        models: {
                            "claude-3-opus": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
                "google": Google(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gemini-pro": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: true,
                        model_filter: None,
                        models: {
                            "gpt-4": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_multiple_endpoints() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/llm"

            [protocols.anthropic]
            enabled = true
            path = "/claude"

            [providers.openai]
            type = "openai"
            api_key = "test-key"

            [providers.openai.models.gpt-4]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/llm",
                },
                anthropic: AnthropicProtocolConfig {
                    enabled: true,
                    path: "/claude",
                },
                responses: ResponsesProtocolConfig {
                    enabled: true,
                    path: "",
                },
            },
            providers: {
                "openai": Openai(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "gpt-4": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn llm_config_anthropic_protocol() {
        let config = indoc! {r#"
            [protocols.openai]
            enabled = true
            path = "/v1"

            [providers.anthropic]
            type = "anthropic"
            api_key = "test-key"

            [providers.anthropic.models.claude-3-opus]
        "#};

        let config: LlmConfig = toml::from_str(config).unwrap();

        assert_debug_snapshot!(&config, @r#"
        LlmConfig {
            enabled: true,
            protocols: LlmProtocolsConfig {
                openai: OpenAIProtocolConfig {
                    enabled: true,
                    path: "/v1",
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
            providers: {
                "anthropic": Anthropic(
                    ApiProviderConfig {
                        api_key: Some(
                            SecretBox<str>([REDACTED]),
                        ),
                        base_url: None,
                        forward_token: false,
                        model_filter: None,
                        models: {
                            "claude-3-opus": ApiModelConfig {
                                rename: None,
                                headers: [],
                            },
                        },
                        headers: [],
                    },
                ),
            },
        }
        "#);
    }

    #[test]
    fn protocol_config_default_paths() {
        // Dialect routes mount at their literal top-level path by default.
        let openai_config = OpenAIProtocolConfig::default();
        assert_eq!(openai_config.path, "");
        assert!(openai_config.enabled);

        let anthropic_config = AnthropicProtocolConfig::default();
        assert_eq!(anthropic_config.path, "");
        assert!(anthropic_config.enabled);
    }
}
