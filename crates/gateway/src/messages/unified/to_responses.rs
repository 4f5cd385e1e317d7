//! Conversions from unified types to OpenAI Responses protocol types.

use crate::messages::{responses, unified};

impl From<unified::UnifiedResponse> for responses::ResponsesResponse {
    fn from(resp: unified::UnifiedResponse) -> Self {
        let status = resp
            .choices
            .first()
            .and_then(|choice| choice.finish_reason.as_ref())
            .map(responses::ResponsesStatus::from)
            .unwrap_or(responses::ResponsesStatus::Completed);

        let output = resp
            .choices
            .into_iter()
            .next()
            .map(|choice| output_items_for_choice(&resp.id, choice))
            .unwrap_or_default();

        Self {
            id: resp.id,
            object: responses::ResponsesObjectType::Response,
            created_at: resp.created,
            model: resp.model,
            status,
            output,
            usage: responses::ResponsesUsage::from(resp.usage),
        }
    }
}

/// A Chat-Completions-style choice nests tool calls inside the assistant
/// message; Responses surfaces each as a sibling output item instead.
fn output_items_for_choice(response_id: &str, choice: unified::UnifiedChoice) -> Vec<responses::OutputItem> {
    let tool_calls = choice.message.compute_tool_calls();
    let status = choice
        .finish_reason
        .as_ref()
        .map(responses::ResponsesStatus::from)
        .unwrap_or(responses::ResponsesStatus::Completed);

    let text = match &choice.message.content {
        unified::UnifiedContentContainer::Text(text) => Some(text.clone()),
        unified::UnifiedContentContainer::Blocks(blocks) => {
            let joined: Vec<&str> = blocks.iter().filter_map(|block| block.as_text()).collect();
            if joined.is_empty() { None } else { Some(joined.join("\n")) }
        }
    };

    let mut items = Vec::with_capacity(1 + tool_calls.as_ref().map_or(0, Vec::len));

    if let Some(text) = text {
        items.push(responses::OutputItem::Message {
            id: format!("msg_{response_id}"),
            role: responses::OutputRole::Assistant,
            status,
            content: vec![responses::OutputContentPart::OutputText {
                text,
                annotations: Vec::new(),
            }],
        });
    }

    for call in tool_calls.into_iter().flatten() {
        let arguments = match call.function.arguments {
            unified::UnifiedArguments::String(s) => s,
            unified::UnifiedArguments::Value(v) => serde_json::to_string(&v).unwrap_or_else(|_| "{}".to_string()),
        };

        items.push(responses::OutputItem::FunctionCall {
            id: format!("fc_{}", call.id),
            call_id: call.id,
            name: call.function.name,
            arguments,
            status: responses::ResponsesStatus::Completed,
        });
    }

    items
}

impl From<&unified::UnifiedFinishReason> for responses::ResponsesStatus {
    fn from(reason: &unified::UnifiedFinishReason) -> Self {
        match reason {
            unified::UnifiedFinishReason::Length => responses::ResponsesStatus::Incomplete,
            unified::UnifiedFinishReason::Stop
            | unified::UnifiedFinishReason::ContentFilter
            | unified::UnifiedFinishReason::ToolCalls => responses::ResponsesStatus::Completed,
        }
    }
}

impl From<unified::UnifiedUsage> for responses::ResponsesUsage {
    fn from(usage: unified::UnifiedUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            input_tokens_details: usage
                .cache_read_tokens
                .map(|cached_tokens| responses::InputTokensDetails { cached_tokens }),
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Converts one unified streaming chunk into the single Responses event it
/// corresponds to: a text delta, a function-call-argument delta, or (on the
/// terminal chunk, recognized by a populated `usage`) the `response.completed`
/// event. A chunk with neither content, a tool-call delta, nor usage (the
/// role-only first chunk) falls back to `response.created`.
impl From<unified::UnifiedChunk> for responses::ResponsesStreamEvent {
    fn from(chunk: unified::UnifiedChunk) -> Self {
        if let Some(usage) = chunk.usage {
            let status = chunk
                .choices
                .first()
                .and_then(|choice| choice.finish_reason.as_ref())
                .map(responses::ResponsesStatus::from)
                .unwrap_or(responses::ResponsesStatus::Completed);

            return responses::ResponsesStreamEvent::Completed {
                response: responses::ResponsesResponse {
                    id: chunk.id.into_owned(),
                    object: responses::ResponsesObjectType::Response,
                    created_at: chunk.created,
                    model: chunk.model.into_owned(),
                    status,
                    output: Vec::new(),
                    usage: responses::ResponsesUsage::from(usage),
                },
            };
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return created_placeholder(chunk.id.into_owned(), chunk.model.into_owned(), chunk.created);
        };

        if let Some(content) = choice.delta.content {
            return responses::ResponsesStreamEvent::OutputTextDelta {
                item_id: chunk.id.into_owned(),
                output_index: choice.index,
                delta: content,
            };
        }

        if let Some(tool_calls) = choice.delta.tool_calls {
            if let Some(delta) = tool_calls.into_iter().find_map(|call| match call {
                unified::UnifiedStreamingToolCall::Start { function, .. } => Some(function.arguments),
                unified::UnifiedStreamingToolCall::Delta { function, .. } => Some(function.arguments),
            }) {
                return responses::ResponsesStreamEvent::FunctionCallArgumentsDelta {
                    item_id: chunk.id.into_owned(),
                    output_index: choice.index,
                    delta,
                };
            }
        }

        created_placeholder(chunk.id.into_owned(), chunk.model.into_owned(), chunk.created)
    }
}

fn created_placeholder(id: String, model: String, created: u64) -> responses::ResponsesStreamEvent {
    responses::ResponsesStreamEvent::Created {
        response: responses::ResponsesResponse {
            id,
            object: responses::ResponsesObjectType::Response,
            created_at: created,
            model,
            status: responses::ResponsesStatus::Incomplete,
            output: Vec::new(),
            usage: responses::ResponsesUsage::default(),
        },
    }
}
