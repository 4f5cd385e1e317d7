//! Wire request type for the Anthropic provider.
//!
//! Built from `UnifiedRequest` via the `From` impl in
//! `messages::unified::to_anthropic`; no protocol-specific conversion lives
//! here.

pub(super) use crate::messages::anthropic::AnthropicChatRequest as AnthropicRequest;
