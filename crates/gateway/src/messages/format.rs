//! Client-facing wire dialect adapters and their registry.
//!
//! Each dialect this gateway speaks to clients (`/v1/chat/completions`,
//! `/v1/messages`, `/v1/responses`) gets a [`FormatAdapter`] translating its
//! wire request/response shapes to and from the canonical
//! [`unified`](crate::messages::unified) types. `AdapterRegistry` stores one
//! per [`Format`], built once at startup from which protocols are enabled,
//! and looked up by format at request time — the same `Box<dyn Trait>`-in-a-registry
//! shape `provider::Provider` already uses for upstream dispatch.
//!
//! Provider-side translation (canonical ⇄ upstream wire shape) is a
//! different concern and stays inlined in each `provider::Provider`
//! implementation, since upstream dialects (Google's in particular) don't
//! correspond 1:1 with a client-facing `Format`.

use std::collections::HashMap;

use super::{anthropic, openai, responses, unified};
use crate::error::LlmError;

/// A client-facing wire dialect this gateway can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Format {
    OpenAiChat,
    Anthropic,
    OpenAiResponses,
}

impl Format {
    fn name(self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai",
            Self::Anthropic => "anthropic",
            Self::OpenAiResponses => "openai_responses",
        }
    }
}

/// Translates between one client-facing wire dialect and the canonical
/// request/response types.
pub(crate) trait FormatAdapter: Send + Sync {
    /// Parses a client request body in this dialect into the canonical
    /// request shape.
    fn client_to_canonical(&self, body: &[u8]) -> crate::Result<unified::UnifiedRequest>;

    /// Serializes a canonical response into this dialect's wire shape.
    fn canonical_to_client(&self, response: unified::UnifiedResponse) -> crate::Result<Vec<u8>>;
}

struct OpenAiChatAdapter;

impl FormatAdapter for OpenAiChatAdapter {
    fn client_to_canonical(&self, body: &[u8]) -> crate::Result<unified::UnifiedRequest> {
        let request: openai::ChatCompletionRequest = sonic_rs::from_slice(body)
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to parse chat completions request: {e}")))?;

        Ok(unified::UnifiedRequest::from(request))
    }

    fn canonical_to_client(&self, response: unified::UnifiedResponse) -> crate::Result<Vec<u8>> {
        let response = openai::ChatCompletionResponse::from(response);

        sonic_rs::to_vec(&response)
            .map_err(|e| LlmError::InternalError(Some(format!("Failed to serialize chat completions response: {e}"))))
    }
}

struct AnthropicAdapter;

impl FormatAdapter for AnthropicAdapter {
    fn client_to_canonical(&self, body: &[u8]) -> crate::Result<unified::UnifiedRequest> {
        let request: anthropic::AnthropicChatRequest = sonic_rs::from_slice(body)
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to parse Anthropic messages request: {e}")))?;

        Ok(unified::UnifiedRequest::from(request))
    }

    fn canonical_to_client(&self, response: unified::UnifiedResponse) -> crate::Result<Vec<u8>> {
        let response = anthropic::AnthropicChatResponse::from(response);

        sonic_rs::to_vec(&response)
            .map_err(|e| LlmError::InternalError(Some(format!("Failed to serialize Anthropic messages response: {e}"))))
    }
}

struct OpenAiResponsesAdapter;

impl FormatAdapter for OpenAiResponsesAdapter {
    fn client_to_canonical(&self, body: &[u8]) -> crate::Result<unified::UnifiedRequest> {
        let request: responses::ResponsesRequest = sonic_rs::from_slice(body)
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to parse Responses request: {e}")))?;

        Ok(unified::UnifiedRequest::from(request))
    }

    fn canonical_to_client(&self, response: unified::UnifiedResponse) -> crate::Result<Vec<u8>> {
        let response = responses::ResponsesResponse::from(response);

        sonic_rs::to_vec(&response)
            .map_err(|e| LlmError::InternalError(Some(format!("Failed to serialize Responses response: {e}"))))
    }
}

/// Read-only lookup of [`FormatAdapter`]s by [`Format`].
///
/// Populated once at startup with exactly the dialects enabled in
/// configuration; a disabled or unrecognized format fails the lookup with
/// [`LlmError::NotRegistered`].
pub(crate) struct AdapterRegistry {
    adapters: HashMap<&'static str, Box<dyn FormatAdapter>>,
}

impl AdapterRegistry {
    pub(crate) fn new(protocols: &config::LlmProtocolsConfig) -> Self {
        let mut adapters: HashMap<&'static str, Box<dyn FormatAdapter>> = HashMap::new();

        if protocols.openai.enabled {
            adapters.insert(Format::OpenAiChat.name(), Box::new(OpenAiChatAdapter));
        }

        if protocols.anthropic.enabled {
            adapters.insert(Format::Anthropic.name(), Box::new(AnthropicAdapter));
        }

        if protocols.responses.enabled {
            adapters.insert(Format::OpenAiResponses.name(), Box::new(OpenAiResponsesAdapter));
        }

        Self { adapters }
    }

    fn get(&self, format: Format) -> crate::Result<&dyn FormatAdapter> {
        self.adapters
            .get(format.name())
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| LlmError::NotRegistered(format.name().to_string()))
    }

    /// Parses a client request body in `format` into the canonical request shape.
    pub(crate) fn client_to_canonical(&self, format: Format, body: &[u8]) -> crate::Result<unified::UnifiedRequest> {
        self.get(format)?.client_to_canonical(body)
    }

    /// Serializes a canonical response into `format`'s wire shape.
    pub(crate) fn canonical_to_client(&self, format: Format, response: unified::UnifiedResponse) -> crate::Result<Vec<u8>> {
        self.get(format)?.canonical_to_client(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocols(openai: bool, anthropic: bool, responses: bool) -> config::LlmProtocolsConfig {
        config::LlmProtocolsConfig {
            openai: config::OpenAIProtocolConfig {
                enabled: openai,
                ..Default::default()
            },
            anthropic: config::AnthropicProtocolConfig {
                enabled: anthropic,
                ..Default::default()
            },
            responses: config::ResponsesProtocolConfig {
                enabled: responses,
                ..Default::default()
            },
        }
    }

    #[test]
    fn disabled_format_fails_with_not_registered() {
        let registry = AdapterRegistry::new(&protocols(true, false, true));

        let error = registry.client_to_canonical(Format::Anthropic, b"{}").unwrap_err();
        assert!(matches!(error, LlmError::NotRegistered(name) if name == "anthropic"));
    }

    #[test]
    fn enabled_format_parses_request() {
        let registry = AdapterRegistry::new(&protocols(true, true, true));

        let body = br#"{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}"#;
        let request = registry.client_to_canonical(Format::OpenAiChat, body).unwrap();
        assert_eq!(request.model, "gpt-4o");
    }
}
