//! Wire request type for the OpenAI provider.
//!
//! OpenAI is the format `UnifiedRequest` was originally modeled on, so the
//! conversion is the plain `From<UnifiedRequest> for ChatCompletionRequest`
//! impl in `messages::unified::to_openai` — nothing provider-specific lives
//! here.

pub(super) use crate::messages::openai::ChatCompletionRequest as OpenAIRequest;
