//! Shared abstractions implemented by every upstream LLM backend: the
//! [`Provider`] trait itself, the [`HttpProvider`] helper for building
//! outgoing requests, and the small [`ModelManager`]/[`token`] helpers that
//! back the per-provider implementations in the submodules below.

use std::{collections::BTreeMap, pin::Pin};

use async_trait::async_trait;
use config::{ApiModelConfig, HeaderRule, ModelConfig};
use futures::Stream;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::SecretString;

use crate::{
    error::LlmError,
    messages::{
        anthropic::CountTokensResponse,
        openai::{Model, ObjectType},
        unified::{UnifiedChunk, UnifiedRequest, UnifiedResponse},
    },
    request::RequestContext,
};

pub mod anthropic;
pub mod google;
pub(crate) mod http_client;
pub mod openai;

/// Stream of incremental chat completion chunks, already normalized to the
/// unified schema regardless of which upstream protocol produced them.
pub type ChatCompletionStream = Pin<Box<dyn Stream<Item = crate::Result<UnifiedChunk>> + Send>>;

/// A backend capable of serving chat completions for one or more models.
///
/// Implementors live one per provider (Anthropic, OpenAI, Google, and the
/// OpenAI-compatible variants that reuse [`openai::OpenAIProvider`]).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Performs a non-streaming chat completion.
    async fn chat_completion(&self, request: UnifiedRequest, context: &RequestContext) -> crate::Result<UnifiedResponse>;

    /// Performs a streaming chat completion.
    async fn chat_completion_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream>;

    /// Lists the models this provider currently exposes, combining any
    /// models discovered from the upstream API with explicitly configured
    /// ones.
    async fn list_models(&self) -> anyhow::Result<Vec<Model>>;

    /// The provider's configured name, used as the `provider/` prefix in
    /// routed model identifiers.
    fn name(&self) -> &str;

    /// Whether this provider can serve `chat_completion_stream` requests.
    fn supports_streaming(&self) -> bool;

    /// Whether this provider has a usable credential of its own: a
    /// statically configured API key, or BYOK forwarding enabled. Route
    /// resolution also treats a provider as available when trust-root
    /// authorization is enabled (it resolves a key per request independent of
    /// what's configured here) — that check is the caller's responsibility,
    /// since it's global server state, not a property of one provider
    /// instance. A provider registered only to expose a pattern route with
    /// neither must never be chosen by route resolution.
    fn is_configured(&self) -> bool;

    /// Counts tokens for a would-be request without sending it upstream.
    ///
    /// Only Anthropic exposes a dedicated counting endpoint; every other
    /// provider falls back to a local estimate.
    async fn count_tokens(&self, request: UnifiedRequest, _context: &RequestContext) -> crate::Result<CountTokensResponse> {
        let input_tokens = crate::token_counter::estimate(&request);

        Ok(CountTokensResponse {
            input_tokens,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 0,
        })
    }
}

/// Helper trait for providers that talk to an upstream HTTP API, handling
/// the header-rule plumbing every one of them needs.
pub(crate) trait HttpProvider {
    /// Provider-level header rules from configuration.
    fn get_provider_headers(&self) -> &[HeaderRule];

    /// The shared HTTP client to issue the request on.
    fn get_http_client(&self) -> &Client;

    /// Builds a request with header rules applied: provider-level rules
    /// first, then model-level rules so they can override the former.
    fn request_builder(
        &self,
        method: Method,
        url: &str,
        context: &RequestContext,
        model_config: Option<&ApiModelConfig>,
    ) -> RequestBuilder {
        let no_model_headers: &[HeaderRule] = &[];
        let model_headers = model_config.map(|config| config.headers.as_slice()).unwrap_or(no_model_headers);

        let headers = header_rules::build_headers(&context.headers, &[self.get_provider_headers(), model_headers]);

        let mut builder = self.get_http_client().request(method, url);

        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }

        builder
    }
}

/// Resolves configured model aliases and exposes the per-model
/// configuration a provider needs when building requests.
pub(crate) struct ModelManager {
    models: BTreeMap<String, ModelConfig>,
    provider_label: String,
}

impl ModelManager {
    pub fn new(models: BTreeMap<String, ModelConfig>, provider_label: &str) -> Self {
        Self {
            models,
            provider_label: provider_label.to_string(),
        }
    }

    /// Resolves a requested model name against the configured models,
    /// returning the upstream name to send (the `rename` target, or the
    /// requested name itself when no rename is configured). Returns `None`
    /// when the requested name isn't present in the configured set at all.
    pub fn resolve_model(&self, requested: &str) -> Option<String> {
        let ModelConfig::Api(config) = self.models.get(requested)?;

        Some(config.rename.clone().unwrap_or_else(|| requested.to_string()))
    }

    /// Returns the configuration for a requested model, keyed by the alias
    /// the client used (before any rename is applied).
    pub fn get_model_config(&self, requested: &str) -> Option<&ApiModelConfig> {
        let ModelConfig::Api(config) = self.models.get(requested)?;

        Some(config)
    }

    /// Lists every explicitly configured model, unprefixed.
    pub fn get_configured_models(&self) -> Vec<Model> {
        self.models
            .keys()
            .map(|id| Model {
                id: id.clone(),
                object: ObjectType::Model,
                created: 0,
                owned_by: self.provider_label.clone(),
            })
            .collect()
    }
}

/// Resolves the API key to use for an upstream request. Priority order:
/// a key resolved through the trust-root authorization adapter for this
/// request, then the client-supplied BYOK key when forwarding is enabled
/// for the provider, then the statically configured key.
pub(crate) mod token {
    use secrecy::SecretString;

    use crate::{error::LlmError, request::RequestContext};

    pub fn get(
        forward_token: bool,
        configured_key: &Option<SecretString>,
        context: &RequestContext,
    ) -> crate::Result<SecretString> {
        if let Some(key) = &context.authorized_key {
            return Ok(key.clone());
        }

        if forward_token
            && let Some(key) = &context.api_key
        {
            return Ok(key.clone());
        }

        configured_key
            .clone()
            .ok_or_else(|| LlmError::AuthenticationFailed("no API key configured for this provider".to_string()))
    }
}
