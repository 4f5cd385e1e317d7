//! Conversions from OpenAI Responses protocol types to unified types.

use crate::messages::{responses, unified};

impl From<responses::ResponsesRequest> for unified::UnifiedRequest {
    fn from(req: responses::ResponsesRequest) -> Self {
        let messages = match req.input {
            responses::ResponsesInput::Text(text) => vec![unified::UnifiedMessage {
                role: unified::UnifiedRole::User,
                content: unified::UnifiedContentContainer::Text(text),
                tool_calls: None,
                tool_call_id: None,
            }],
            responses::ResponsesInput::Items(items) => {
                items.into_iter().map(unified::UnifiedMessage::from).collect()
            }
        };

        Self {
            model: req.model,
            messages,
            system: req.instructions,
            max_tokens: req.max_output_tokens,
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: None,
            stream: req.stream,
            tools: req
                .tools
                .map(|tools| tools.into_iter().map(unified::UnifiedTool::from).collect()),
            tool_choice: req.tool_choice.map(unified::UnifiedToolChoice::from),
            parallel_tool_calls: req.parallel_tool_calls,
            metadata: None,
        }
    }
}

impl From<responses::InputRole> for unified::UnifiedRole {
    fn from(role: responses::InputRole) -> Self {
        match role {
            responses::InputRole::User => unified::UnifiedRole::User,
            responses::InputRole::Assistant => unified::UnifiedRole::Assistant,
            // "developer" is the Responses-era rename of "system"; both collapse here.
            responses::InputRole::System | responses::InputRole::Developer => unified::UnifiedRole::System,
        }
    }
}

impl From<responses::InputItem> for unified::UnifiedMessage {
    fn from(item: responses::InputItem) -> Self {
        match item {
            responses::InputItem::Message { role, content } => {
                let blocks: Vec<unified::UnifiedContent> = content.into_iter().map(unified::UnifiedContent::from).collect();

                let content = if let [unified::UnifiedContent::Text { .. }] = blocks.as_slice() {
                    let Some(unified::UnifiedContent::Text { text }) = blocks.into_iter().next() else {
                        unreachable!()
                    };
                    unified::UnifiedContentContainer::Text(text)
                } else {
                    unified::UnifiedContentContainer::Blocks(blocks)
                };

                Self {
                    role: unified::UnifiedRole::from(role),
                    content,
                    tool_calls: None,
                    tool_call_id: None,
                }
            }
            responses::InputItem::FunctionCall { call_id, name, arguments } => {
                let input = serde_json::from_str(&arguments).unwrap_or(serde_json::Value::String(arguments));

                Self {
                    role: unified::UnifiedRole::Assistant,
                    content: unified::UnifiedContentContainer::Blocks(vec![unified::UnifiedContent::ToolUse {
                        id: call_id,
                        name,
                        input,
                    }]),
                    tool_calls: None,
                    tool_call_id: None,
                }
            }
            responses::InputItem::FunctionCallOutput { call_id, output } => Self {
                role: unified::UnifiedRole::Tool,
                content: unified::UnifiedContentContainer::Text(output),
                tool_calls: None,
                tool_call_id: Some(call_id),
            },
        }
    }
}

impl From<responses::InputContentPart> for unified::UnifiedContent {
    fn from(part: responses::InputContentPart) -> Self {
        match part {
            responses::InputContentPart::InputText { text } => unified::UnifiedContent::Text { text },
            responses::InputContentPart::OutputText { text } => unified::UnifiedContent::Text { text },
            responses::InputContentPart::InputImage { image_url } => unified::UnifiedContent::Image {
                source: unified::UnifiedImageSource::Url { url: image_url },
            },
        }
    }
}

impl From<responses::ResponsesTool> for unified::UnifiedTool {
    fn from(tool: responses::ResponsesTool) -> Self {
        let responses::ResponsesTool::Function {
            name,
            description,
            parameters,
            strict,
        } = tool;

        Self {
            function: unified::UnifiedFunction {
                name,
                description,
                parameters,
                strict,
            },
        }
    }
}

impl From<responses::ResponsesToolChoiceMode> for unified::UnifiedToolChoiceMode {
    fn from(mode: responses::ResponsesToolChoiceMode) -> Self {
        match mode {
            responses::ResponsesToolChoiceMode::None => unified::UnifiedToolChoiceMode::None,
            responses::ResponsesToolChoiceMode::Auto => unified::UnifiedToolChoiceMode::Auto,
            responses::ResponsesToolChoiceMode::Required => unified::UnifiedToolChoiceMode::Required,
        }
    }
}

impl From<responses::ResponsesToolChoice> for unified::UnifiedToolChoice {
    fn from(choice: responses::ResponsesToolChoice) -> Self {
        match choice {
            responses::ResponsesToolChoice::Mode(mode) => unified::UnifiedToolChoice::Mode(unified::UnifiedToolChoiceMode::from(mode)),
            responses::ResponsesToolChoice::Specific { name, .. } => {
                unified::UnifiedToolChoice::Specific {
                    function: unified::UnifiedFunctionChoice { name },
                }
            }
        }
    }
}
