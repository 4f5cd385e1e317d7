//! Response and streaming types for the Google Gemini `generateContent` API.
//!
//! Gemini uses the same `Content { role, parts }` shape for both inbound
//! conversation history and outbound candidates, so these types are shared
//! between [`super::input::GoogleGenerateRequest`] and the response/stream
//! parsing below.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::unified;

/// Conversational role in a Gemini `Content` block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GoogleRole {
    User,
    Model,
}

/// A single turn's content: a role plus an ordered list of parts.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleContent {
    pub parts: Vec<GooglePart>,
    pub role: GoogleRole,
}

/// One piece of content within a turn.
///
/// Exactly one of `text`, `function_call`, or `function_response` is set,
/// mirroring Gemini's `oneof` part union.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GooglePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GoogleFunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GoogleFunctionResponse>,
}

/// A function/tool invocation requested by the model.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleFunctionCall {
    pub name: String,
    pub args: Value,

    /// Opaque signature some Gemini models attach to a call so it can be
    /// replayed unchanged in a later turn; not interpreted by the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

/// The caller's result for a previously requested function call.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoogleFunctionResponse {
    pub name: String,
    pub response: Value,
}

/// Why a candidate stopped generating.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub enum GoogleFinishReason {
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "MAX_TOKENS")]
    MaxTokens,
    #[serde(rename = "SAFETY")]
    Safety,
    #[serde(rename = "RECITATION")]
    Recitation,
    #[serde(rename = "BLOCKLIST")]
    Blocklist,
    #[serde(rename = "PROHIBITED_CONTENT")]
    ProhibitedContent,
    #[serde(rename = "SPII")]
    Spii,
    #[serde(rename = "MALFORMED_FUNCTION_CALL")]
    MalformedFunctionCall,
    #[serde(untagged)]
    Other(String),
}

impl GoogleFinishReason {
    fn into_unified(self, has_tool_calls: bool) -> unified::UnifiedFinishReason {
        match self {
            _ if has_tool_calls => unified::UnifiedFinishReason::ToolCalls,
            GoogleFinishReason::Stop => unified::UnifiedFinishReason::Stop,
            GoogleFinishReason::MaxTokens => unified::UnifiedFinishReason::Length,
            GoogleFinishReason::Safety
            | GoogleFinishReason::Recitation
            | GoogleFinishReason::Blocklist
            | GoogleFinishReason::ProhibitedContent
            | GoogleFinishReason::Spii => unified::UnifiedFinishReason::ContentFilter,
            GoogleFinishReason::MalformedFunctionCall => unified::UnifiedFinishReason::ToolCalls,
            GoogleFinishReason::Other(reason) => {
                log::warn!("Unknown finish reason from Google: {reason}");
                unified::UnifiedFinishReason::Stop
            }
        }
    }
}

/// Token accounting attached to a `generateContent` response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
    #[serde(default)]
    pub cached_content_token_count: u32,
}

/// A single completion candidate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCandidate {
    #[serde(default)]
    pub content: Option<GoogleContent>,
    #[serde(default)]
    pub finish_reason: Option<GoogleFinishReason>,
    #[serde(default)]
    pub index: u32,
}

/// Response body for `POST /models/{model}:generateContent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGenerateResponse {
    pub candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GoogleUsageMetadata>,
}

fn content_to_unified(content: Option<GoogleContent>) -> (Vec<unified::UnifiedContent>, bool) {
    let mut blocks = Vec::new();
    let mut has_tool_calls = false;

    for part in content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            blocks.push(unified::UnifiedContent::Text { text });
        } else if let Some(call) = part.function_call {
            has_tool_calls = true;
            blocks.push(unified::UnifiedContent::ToolUse {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                name: call.name,
                input: call.args,
            });
        }
    }

    (blocks, has_tool_calls)
}

impl From<GoogleGenerateResponse> for unified::UnifiedResponse {
    fn from(response: GoogleGenerateResponse) -> Self {
        let usage = response.usage_metadata.unwrap_or_default();

        let choices = response
            .candidates
            .into_iter()
            .map(|candidate| {
                let (blocks, has_tool_calls) = content_to_unified(candidate.content);

                let finish_reason = candidate
                    .finish_reason
                    .map(|reason| reason.into_unified(has_tool_calls))
                    .unwrap_or(if has_tool_calls {
                        unified::UnifiedFinishReason::ToolCalls
                    } else {
                        unified::UnifiedFinishReason::Stop
                    });

                unified::UnifiedChoice {
                    index: candidate.index,
                    message: unified::UnifiedMessage {
                        role: unified::UnifiedRole::Assistant,
                        content: unified::UnifiedContentContainer::Blocks(blocks),
                        tool_calls: None,
                        tool_call_id: None,
                    },
                    finish_reason: Some(finish_reason),
                }
            })
            .collect();

        Self {
            id: format!("gemini_{}", uuid::Uuid::new_v4()),
            model: String::new(), // set by the provider from the resolved alias
            choices,
            usage: unified::UnifiedUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
                cache_write_tokens: None,
                cache_read_tokens: (usage.cached_content_token_count > 0).then_some(usage.cached_content_token_count),
            },
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            stop_reason: None,
            stop_sequence: None,
        }
    }
}

// Streaming types. Gemini's `alt=sse` stream emits one complete (partial)
// `GenerateContentResponse` JSON object per SSE frame rather than OpenAI-style
// flat deltas, but the text/function-call fragments inside still need to be
// re-assembled by the pipeline the same way. Borrowed strings avoid copying
// the (often large) text fragments out of the SSE frame buffer.

/// One SSE frame of a Gemini streaming response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleStreamChunk<'a> {
    #[serde(default, borrow)]
    pub candidates: Vec<GoogleStreamCandidate<'a>>,
    #[serde(default)]
    pub usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleStreamCandidate<'a> {
    #[serde(default, borrow)]
    pub content: Option<GoogleStreamContent<'a>>,
    #[serde(default)]
    pub finish_reason: Option<GoogleFinishReason>,
    #[serde(default)]
    pub index: u32,
}

#[derive(Debug, Deserialize)]
pub struct GoogleStreamContent<'a> {
    #[serde(default, borrow)]
    pub parts: Vec<GoogleStreamPart<'a>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoogleStreamPart<'a> {
    #[serde(default, borrow)]
    pub text: Option<Cow<'a, str>>,
    #[serde(default, borrow)]
    pub function_call: Option<GoogleStreamFunctionCall<'a>>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleStreamFunctionCall<'a> {
    #[serde(borrow)]
    pub name: Cow<'a, str>,
    #[serde(default)]
    pub args: Value,
}

impl GoogleStreamChunk<'_> {
    /// Converts one Gemini SSE frame into a unified streaming chunk.
    ///
    /// Function calls arrive whole (Gemini doesn't fragment call arguments
    /// across frames the way OpenAI/Anthropic do), so each one is emitted as
    /// a single `Start` tool call with the complete arguments already in
    /// place; the pipeline's tool assembler treats that as a one-shot call.
    pub fn into_chunk(self, provider: &str, model: &str) -> unified::UnifiedChunk {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut finish_reason = None;

        for candidate in self.candidates {
            for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                if let Some(text) = part.text {
                    content.push_str(&text);
                }

                if let Some(call) = part.function_call {
                    tool_calls.push(unified::UnifiedStreamingToolCall::Start {
                        index: tool_calls.len(),
                        id: format!("call_{}", uuid::Uuid::new_v4()),
                        function: unified::UnifiedFunctionStart {
                            name: call.name.into_owned(),
                            arguments: serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string()),
                        },
                    });
                }
            }

            if let Some(reason) = candidate.finish_reason {
                finish_reason = Some(reason.into_unified(!tool_calls.is_empty()));
            }
        }

        log::trace!("assembled streaming chunk from {provider} for model {model}");

        unified::UnifiedChunk {
            id: std::borrow::Cow::Owned(format!("gemini_{}", uuid::Uuid::new_v4())),
            model: std::borrow::Cow::Owned(model.to_string()),
            choices: vec![unified::UnifiedChoiceDelta {
                index: 0,
                delta: unified::UnifiedMessageDelta {
                    role: None,
                    content: (!content.is_empty()).then_some(content),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                },
                finish_reason,
            }],
            usage: self.usage_metadata.map(|usage| unified::UnifiedUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
                cache_write_tokens: None,
                cache_read_tokens: (usage.cached_content_token_count > 0).then_some(usage.cached_content_token_count),
            }),
            created: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_candidate() {
        let response: GoogleGenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "hello"}], "role": "model"},
                    "finishReason": "STOP",
                    "index": 0
                }],
                "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 1, "totalTokenCount": 4}
            }"#,
        )
        .unwrap();

        let unified = unified::UnifiedResponse::from(response);
        assert_eq!(unified.usage.prompt_tokens, 3);
        assert_eq!(unified.choices[0].finish_reason, Some(unified::UnifiedFinishReason::Stop));
    }

    #[test]
    fn stream_chunk_assembles_function_call() {
        let chunk: GoogleStreamChunk<'_> = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"functionCall": {"name": "get_weather", "args": {"city": "NYC"}}}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();

        let unified_chunk = chunk.into_chunk("google", "gemini-1.5-pro");
        let delta = &unified_chunk.choices[0].delta;
        assert!(delta.tool_calls.is_some());
        assert_eq!(unified_chunk.choices[0].finish_reason, Some(unified::UnifiedFinishReason::ToolCalls));
    }
}
