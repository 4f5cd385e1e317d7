//! Wire response types for the OpenAI provider.
//!
//! OpenAI is the format `UnifiedResponse`/`UnifiedChunk` were originally
//! modeled on, so non-streaming responses and stream chunks reuse the
//! message types verbatim; only the final `UnifiedChunk` conversion needs a
//! provider-facing entry point.

use crate::messages::unified::UnifiedChunk;

pub(super) use crate::messages::openai::{ChatCompletionChunk as OpenAIStreamChunk, ChatCompletionResponse as OpenAIResponse};

impl OpenAIStreamChunk {
    /// Converts one upstream chunk into the canonical streaming event.
    ///
    /// `provider` is accepted for parity with the other providers' stream
    /// conversion entry points; OpenAI chunks carry everything needed
    /// (model, choices, usage) without it.
    pub(crate) fn into_chunk(self, provider: &str) -> UnifiedChunk {
        log::trace!("assembled streaming chunk from {provider}");
        UnifiedChunk::from(self)
    }
}
