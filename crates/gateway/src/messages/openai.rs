//! Request and response types for the OpenAI Chat Completions protocol.
//!
//! This is the primary interchange format: the canonical schema in
//! [`super::unified`] is modeled closely on it, and every other provider
//! and dialect converts through these types.

use std::fmt;

use serde::{Deserialize, Serialize, de::Deserializer, ser::SerializeStruct};

/// JSON Schema document describing a tool's parameters.
///
/// Kept as a raw `serde_json::Value` rather than a typed schema struct:
/// every provider just forwards the schema verbatim to the model, nothing
/// in the gateway inspects its shape beyond occasionally stripping fields
/// Google's function declarations don't support.
pub type JsonSchema = serde_json::Value;

/// Top-level object kind, mirrors OpenAI's `object` discriminator field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectType {
    #[serde(rename = "model")]
    Model,
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
    #[serde(rename = "list")]
    List,
}

/// Role of a message participant.
///
/// `Other` preserves forward compatibility with roles a future OpenAI
/// release might introduce without rejecting the request outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "tool")]
    Tool,
    #[serde(untagged)]
    Other(String),
}

/// A single message in a chat completion request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Discriminator for tool kinds. OpenAI only defines "function" today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallType {
    #[serde(rename = "function")]
    Function,
}

/// A function tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: ToolCallType,
    pub function: FunctionDefinition,
}

/// The callable function backing a [`Tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub parameters: Box<JsonSchema>,
}

/// A tool call emitted by the assistant in a non-streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub tool_type: ToolCallType,
    pub function: FunctionCall,
}

/// Name and raw JSON-encoded arguments of an invoked function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// How the model should decide whether and which tool to call.
///
/// `Mode` covers the simple string forms (`"auto"`, `"none"`, `"required"`);
/// `Specific` covers `{"type": "function", "function": {"name": "..."}}`,
/// which forces a particular tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(ToolChoiceMode),
    Specific {
        #[serde(rename = "type")]
        tool_type: ToolCallType,
        function: ToolChoiceFunction,
    },
}

/// The specific tool named by a [`ToolChoice::Specific`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    pub name: String,
}

/// String forms of [`ToolChoice`].
///
/// `Any` is accepted as an alias for `Required` (some SDKs and the
/// Anthropic-originated convention use "any" for "force some tool call"),
/// but is never produced when serializing back out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolChoiceMode {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "any")]
    Any,
    #[serde(untagged)]
    Other(String),
}

/// Why generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "length")]
    Length,
    #[serde(rename = "content_filter")]
    ContentFilter,
    #[serde(rename = "tool_calls")]
    ToolCalls,
    #[serde(untagged)]
    Other(String),
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_stop")]
    pub stop: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Accepts `stop` as either a bare string or an array of strings.
fn deserialize_stop<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StopValue {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<StopValue>::deserialize(deserializer)?.map(|value| match value {
        StopValue::One(s) => vec![s],
        StopValue::Many(v) => v,
    }))
}

/// Token usage accounting shared by responses and streaming chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

/// Breakdown of the prompt-token bucket, notably cache hits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u32,
}

/// A single completion choice in a non-streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

/// Response body for `POST /v1/chat/completions` with `stream: false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: ObjectType,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

/// The initial fragment of a streaming tool call, or a subsequent argument
/// delta.
///
/// OpenAI encodes both on the wire as a single flat object keyed by
/// `index`: the first delta for a given index carries `id`/`type`/
/// `function.name`, later deltas only carry `function.arguments`. This
/// type parses that wire shape into the two logical cases.
#[derive(Debug, Clone)]
pub enum StreamingToolCall {
    Start {
        index: u32,
        id: String,
        r#type: ToolCallType,
        function: FunctionStart,
    },
    Delta {
        index: u32,
        function: FunctionDelta,
    },
}

/// Name and first argument fragment of a newly started streaming tool call.
#[derive(Debug, Clone, Default)]
pub struct FunctionStart {
    pub name: String,
    pub arguments: String,
}

/// An argument fragment appended to an in-progress streaming tool call.
#[derive(Debug, Clone, Default)]
pub struct FunctionDelta {
    pub arguments: String,
}

#[derive(Deserialize)]
struct StreamingToolCallWire {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<ToolCallType>,
    #[serde(default)]
    function: Option<FunctionWire>,
}

#[derive(Deserialize)]
struct FunctionWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

impl<'de> Deserialize<'de> for StreamingToolCall {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = StreamingToolCallWire::deserialize(deserializer)?;

        Ok(match wire.id {
            Some(id) => StreamingToolCall::Start {
                index: wire.index,
                id,
                r#type: wire.kind.unwrap_or(ToolCallType::Function),
                function: FunctionStart {
                    name: wire.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                    arguments: wire.function.and_then(|f| f.arguments).unwrap_or_default(),
                },
            },
            None => StreamingToolCall::Delta {
                index: wire.index,
                function: FunctionDelta {
                    arguments: wire.function.and_then(|f| f.arguments).unwrap_or_default(),
                },
            },
        })
    }
}

impl Serialize for StreamingToolCall {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            StreamingToolCall::Start {
                index,
                id,
                r#type,
                function,
            } => {
                let mut s = serializer.serialize_struct("StreamingToolCall", 4)?;
                s.serialize_field("index", index)?;
                s.serialize_field("id", id)?;
                s.serialize_field("type", r#type)?;
                s.serialize_field(
                    "function",
                    &FunctionWireOut {
                        name: Some(&function.name),
                        arguments: &function.arguments,
                    },
                )?;
                s.end()
            }
            StreamingToolCall::Delta { index, function } => {
                let mut s = serializer.serialize_struct("StreamingToolCall", 2)?;
                s.serialize_field("index", index)?;
                s.serialize_field(
                    "function",
                    &FunctionWireOut {
                        name: None,
                        arguments: &function.arguments,
                    },
                )?;
                s.end()
            }
        }
    }
}

#[derive(Serialize)]
struct FunctionWireOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    arguments: &'a str,
}

/// Delta applied to a single choice in a streaming chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessageDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamingToolCall>>,
}

/// One choice's worth of delta in a streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoiceDelta {
    pub index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,

    pub delta: ChatMessageDelta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// A single Server-Sent Event payload from a streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: ObjectType,
    pub created: u64,
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,

    pub choices: Vec<ChatChoiceDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single entry in a `GET /v1/models` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub object: ObjectType,
    pub created: u64,
    pub owned_by: String,
}

/// Response body for `GET /v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: ObjectType,
    pub data: Vec<Model>,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::ContentFilter => write!(f, "content_filter"),
            FinishReason::ToolCalls => write!(f, "tool_calls"),
            FinishReason::Other(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_accepts_string_or_array() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"gpt-4o","messages":[],"stop":"\n\n"}"#,
        )
        .unwrap();
        assert_eq!(req.stop, Some(vec!["\n\n".to_string()]));

        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"gpt-4o","messages":[],"stop":["a","b"]}"#,
        )
        .unwrap();
        assert_eq!(req.stop, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn tool_choice_mode_accepts_any_as_alias_for_required() {
        let choice: ToolChoice = serde_json::from_str(r#""any""#).unwrap();
        assert!(matches!(choice, ToolChoice::Mode(ToolChoiceMode::Any)));
    }

    #[test]
    fn tool_choice_specific_round_trips() {
        let json = serde_json::json!({"type": "function", "function": {"name": "get_weather"}});
        let choice: ToolChoice = serde_json::from_value(json).unwrap();
        let ToolChoice::Specific { function, .. } = &choice else {
            unreachable!("expected specific tool choice");
        };
        assert_eq!(function.name, "get_weather");
    }

    #[test]
    fn streaming_tool_call_start_then_delta() {
        let start: StreamingToolCall = serde_json::from_str(
            r#"{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}"#,
        )
        .unwrap();
        assert!(matches!(start, StreamingToolCall::Start { .. }));

        let delta: StreamingToolCall =
            serde_json::from_str(r#"{"index":0,"function":{"arguments":"{\"loc"}}"#).unwrap();
        assert!(matches!(delta, StreamingToolCall::Delta { .. }));
    }

    #[test]
    fn chat_role_preserves_unknown_role() {
        let role: ChatRole = serde_json::from_str(r#""developer""#).unwrap();
        assert_eq!(role, ChatRole::Other("developer".to_string()));
    }
}
