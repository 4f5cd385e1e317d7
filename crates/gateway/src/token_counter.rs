//! Local token estimate used by providers with no dedicated counting
//! endpoint (everything except Anthropic's native `/messages/count_tokens`).
//!
//! This is a rough heuristic, not a tokenizer: counting exactly requires a
//! model-specific vocabulary this gateway has no reason to vendor. Roughly
//! four characters per token holds up well enough across English prose for
//! pre-dispatch budget estimates.

use crate::messages::unified::{
    UnifiedContent, UnifiedContentContainer, UnifiedMessage, UnifiedRequest, UnifiedToolResultContent,
};

const CHARS_PER_TOKEN: usize = 4;

/// Estimates the input token count of a request without contacting any
/// upstream.
pub fn estimate(request: &UnifiedRequest) -> i32 {
    let mut chars = request.system.as_ref().map(String::len).unwrap_or(0);

    for message in &request.messages {
        chars += message_chars(message);
    }

    ((chars / CHARS_PER_TOKEN) as i32).max(1)
}

fn message_chars(message: &UnifiedMessage) -> usize {
    match &message.content {
        UnifiedContentContainer::Text(text) => text.len(),
        UnifiedContentContainer::Blocks(blocks) => blocks.iter().map(content_chars).sum(),
    }
}

fn content_chars(content: &UnifiedContent) -> usize {
    match content {
        UnifiedContent::Text { text } => text.len(),
        UnifiedContent::ToolUse { input, .. } => input.to_string().len(),
        UnifiedContent::ToolResult { content, .. } => match content {
            UnifiedToolResultContent::Text(text) => text.len(),
            UnifiedToolResultContent::Multiple(texts) => texts.iter().map(String::len).sum(),
        },
        UnifiedContent::Image { .. } | UnifiedContent::Audio { .. } | UnifiedContent::Video { .. } => 0,
        UnifiedContent::Document { .. } => 0,
    }
}
