//! Request and response types for the OpenAI Responses protocol (`/v1/responses`).
//!
//! Responses replaces Chat Completions' flat `messages` array with an
//! `input`/`output` item model: a request carries a string or an array of
//! typed input items, and a response carries an array of typed output items
//! (`message`, `function_call`, ...) instead of `choices`. The gateway only
//! implements the item kinds needed to round-trip through the unified
//! schema; anything else in an inbound request is rejected by serde rather
//! than silently dropped.

use serde::{Deserialize, Serialize};

use super::openai::JsonSchema;

/// Request body for `POST /v1/responses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,

    pub input: ResponsesInput,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponsesTool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ResponsesToolChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Either a bare prompt string or a full array of input items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Items(Vec<InputItem>),
}

/// One entry of `input`. `Message` covers ordinary turns; `FunctionCallOutput`
/// feeds a tool result back in; `FunctionCall` echoes a prior call when the
/// caller replays history rather than relying on `previous_response_id`
/// (which this gateway, being stateless, does not support).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: InputRole,
        content: Vec<InputContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

/// Role carried by an input message. `Developer` is the Responses-era
/// replacement for `system` and is treated identically here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    User,
    Assistant,
    System,
    Developer,
}

/// A content part inside an input message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentPart {
    InputText { text: String },
    InputImage { image_url: String },
    OutputText { text: String },
}

/// Function tool definition. Flat (no `function` wrapper) unlike Chat
/// Completions' `Tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesTool {
    Function {
        name: String,
        #[serde(default)]
        description: String,
        parameters: Box<JsonSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strict: Option<bool>,
    },
}

/// How the model should decide whether and which tool to call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    Mode(ResponsesToolChoiceMode),
    Specific {
        #[serde(rename = "type")]
        choice_type: ResponsesToolChoiceType,
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsesToolChoiceMode {
    None,
    Auto,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsesToolChoiceType {
    Function,
}

/// Terminal lifecycle state of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsesStatus {
    Completed,
    Incomplete,
    Failed,
}

/// Response body for `POST /v1/responses` with `stream: false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    pub id: String,
    pub object: ResponsesObjectType,
    pub created_at: u64,
    pub model: String,
    pub status: ResponsesStatus,
    pub output: Vec<OutputItem>,
    pub usage: ResponsesUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponsesObjectType {
    #[serde(rename = "response")]
    Response,
}

/// One entry of `output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        id: String,
        role: OutputRole,
        status: ResponsesStatus,
        content: Vec<OutputContentPart>,
    },
    FunctionCall {
        id: String,
        call_id: String,
        name: String,
        arguments: String,
        status: ResponsesStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContentPart {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<serde_json::Value>,
    },
    Refusal {
        refusal: String,
    },
}

/// Token usage, Responses-dialect shape: `input_tokens`/`output_tokens`
/// rather than Chat Completions' `prompt_tokens`/`completion_tokens`, and
/// cache hits nested under `input_tokens_details`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u32,
}

/// Server-sent streaming events. Only the subset the gateway actually
/// produces from a [`crate::messages::unified::UnifiedChunk`] stream: text
/// deltas, function-call-argument deltas, and the terminal `completed`/
/// `failed` events that carry final usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponsesResponse },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        item_id: String,
        output_index: u32,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        item_id: String,
        output_index: u32,
        delta: String,
    },

    #[serde(rename = "response.completed")]
    Completed { response: ResponsesResponse },

    #[serde(rename = "response.failed")]
    Failed { response: ResponsesResponse },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_accepts_bare_string_or_item_array() {
        let req: ResponsesRequest = serde_json::from_str(r#"{"model":"gpt-4o","input":"hello"}"#).unwrap();
        assert!(matches!(req.input, ResponsesInput::Text(s) if s == "hello"));

        let req: ResponsesRequest = serde_json::from_str(
            r#"{"model":"gpt-4o","input":[{"type":"message","role":"user","content":[{"type":"input_text","text":"hi"}]}]}"#,
        )
        .unwrap();
        assert!(matches!(req.input, ResponsesInput::Items(items) if items.len() == 1));
    }

    #[test]
    fn function_call_output_round_trips() {
        let json = serde_json::json!({"type":"function_call_output","call_id":"call_1","output":"42"});
        let item: InputItem = serde_json::from_value(json).unwrap();
        assert!(matches!(item, InputItem::FunctionCallOutput { call_id, output } if call_id == "call_1" && output == "42"));
    }

    #[test]
    fn stream_event_tag_matches_wire_names() {
        let event = ResponsesStreamEvent::OutputTextDelta {
            item_id: "item_1".to_string(),
            output_index: 0,
            delta: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "response.output_text.delta");
    }
}
