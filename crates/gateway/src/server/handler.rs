//! Thin handle used by the axum routes; wraps the resolved provider set.

use jiff::Timestamp;

use crate::{
    budget::BudgetStatus,
    messages::{
        anthropic::CountTokensResponse,
        format::AdapterRegistry,
        openai::ModelsResponse,
        unified::{UnifiedRequest, UnifiedResponse},
    },
    provider::ChatCompletionStream,
    request::RequestContext,
    server::{LlmServer, LlmService},
    usage::{UsagePage, UsageSummary},
};

/// Handle shared across axum route handlers, wired up by [`super::LlmServerBuilder`].
#[derive(Clone)]
pub(crate) struct LlmHandler(LlmServer);

impl LlmHandler {
    pub(crate) fn new(server: LlmServer) -> Self {
        Self(server)
    }

    /// Client-facing wire dialect adapters for the protocols enabled in configuration.
    pub(crate) fn format_registry(&self) -> &AdapterRegistry {
        self.0.format_registry()
    }

    /// List all available models from all providers.
    pub(crate) async fn models(&self) -> ModelsResponse {
        self.0.models().await
    }

    /// Process a unified chat completion request (protocol-agnostic).
    pub(crate) async fn completions(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<UnifiedResponse> {
        self.0.completions(request, context).await
    }

    /// Process a unified streaming chat completion request (protocol-agnostic).
    pub(crate) async fn completions_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        self.0.completions_stream(request, context).await
    }

    /// Forward an Anthropic count tokens request to the appropriate provider.
    pub(crate) async fn count_tokens(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<CountTokensResponse> {
        self.0.count_tokens(request, context).await
    }

    /// Aggregated usage summary for `[start, end)`.
    pub(crate) async fn usage_summary(&self, start: Timestamp, end: Timestamp) -> anyhow::Result<UsageSummary> {
        self.0.usage_summary(start, end).await
    }

    /// Paginated usage records for `[start, end)`.
    pub(crate) async fn usage_list(&self, start: Timestamp, end: Timestamp, limit: usize, offset: usize) -> anyhow::Result<UsagePage> {
        self.0.usage_list(start, end, limit, offset).await
    }

    /// Cost grouped by provider for `[start, end)`.
    pub(crate) async fn usage_cost_by_provider(&self, start: Timestamp, end: Timestamp) -> anyhow::Result<Vec<(String, f64)>> {
        self.0.usage_cost_by_provider(start, end).await
    }

    /// Cost grouped by model for `[start, end)`.
    pub(crate) async fn usage_cost_by_model(&self, start: Timestamp, end: Timestamp) -> anyhow::Result<Vec<(String, f64)>> {
        self.0.usage_cost_by_model(start, end).await
    }

    /// Hourly cost/token breakdown for the 24 hours ending at `now`.
    pub(crate) async fn usage_hourly_breakdown(&self, now: Timestamp) -> anyhow::Result<Vec<crate::usage::HourlyBucket>> {
        self.0.usage_hourly_breakdown(now).await
    }

    /// Current budget status.
    pub(crate) async fn budget_status(&self) -> anyhow::Result<BudgetStatus> {
        self.0.budget_status().await
    }

    /// Updates the monthly spend limit.
    pub(crate) async fn set_budget(&self, amount_usd: Option<f64>, alert_only: bool) -> anyhow::Result<()> {
        self.0.set_budget(amount_usd, alert_only).await
    }
}
