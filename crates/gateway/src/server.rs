mod builder;
mod handler;
mod model_discovery;
mod service;

pub(crate) use builder::LlmServerBuilder;
pub(crate) use handler::LlmHandler;
use model_discovery::ModelDiscovery;
pub(crate) use service::LlmService;

use std::{fmt, sync::Arc};

use config::LlmConfig;
use futures::stream::StreamExt;
use itertools::Itertools;
use regex::Regex;

use crate::{
    auth::AuthorizationAdapter,
    budget::{BudgetEnforcer, BudgetStatus, SpendLimit},
    error::LlmError,
    messages::{
        anthropic::CountTokensResponse,
        format::AdapterRegistry,
        openai::{ModelsResponse, ObjectType},
        unified::{UnifiedRequest, UnifiedResponse},
    },
    pricing::PricingCatalog,
    provider::{ChatCompletionStream, Provider},
    request::RequestContext,
    usage::{UsagePage, UsageRecord, UsageStore},
};

#[derive(Clone)]
pub(crate) struct LlmServer {
    shared: Arc<LlmServerInner>,
}

pub(crate) struct LlmServerInner {
    /// Live provider handles that service requests.
    pub(crate) providers: Vec<Box<dyn Provider>>,
    /// Resolved configuration snapshot used for routing.
    pub(crate) config: LlmConfig,
    /// Ordered regex routes for pattern-based model resolution.
    pattern_routes: Vec<ModelPatternRoute>,
    /// Model discovery and caching for pattern-based providers.
    model_discovery: ModelDiscovery,
    /// Pricing catalog backing cost calculation and price-based routing.
    pricing: PricingCatalog,
    /// Usage accounting store (C8).
    usage: UsageStore,
    /// Monthly spend limit enforcement (C9).
    budget: BudgetEnforcer,
    /// Trust-root authorization adapter (C10), when `authorization.enabled`.
    authorization: Option<AuthorizationAdapter>,
    /// Client-facing wire dialect adapters, keyed by enabled protocol.
    pub(crate) adapter_registry: AdapterRegistry,
}

#[derive(Debug, Clone)]
pub(super) struct ModelPatternRoute {
    provider_index: usize,
    regex: Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelRouteSource {
    LegacyPrefix,
    Pattern,
    /// No prefix or pattern matched; the cheapest configured provider that
    /// prices this model was selected (§4.4 step 2).
    PriceFallback,
}

struct ResolvedModelRoute<'providers, 'model> {
    providers: &'providers [Box<dyn Provider>],
    provider_index: usize,
    model_name: &'model str,
    source: ModelRouteSource,
}

impl<'providers, 'model> ResolvedModelRoute<'providers, 'model> {
    fn provider(&self) -> &dyn Provider {
        self.providers[self.provider_index].as_ref()
    }

    fn provider_name(&self) -> &str {
        self.provider().name()
    }
}

impl fmt::Debug for ResolvedModelRoute<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModelRoute")
            .field("provider", &self.provider_name())
            .field("model_name", &self.model_name)
            .field("source", &self.source)
            .finish()
    }
}

impl LlmServer {
    /// Client-facing wire dialect adapters for the protocols enabled in configuration.
    pub(crate) fn format_registry(&self) -> &AdapterRegistry {
        &self.shared.adapter_registry
    }

    /// Process a unified chat completion request (protocol-agnostic).
    pub async fn unified_completions(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<UnifiedResponse> {
        // Resolve routing for the requested model
        let original_model = request.model.clone();
        let route = self.resolve_model_route_for_request(&original_model).await?;
        let provider_name = route.provider_name().to_string();
        let routed_model = route.model_name.to_string();

        self.enforce_budget_for(&provider_name, &routed_model, request.max_tokens).await?;

        let provider = self.shared.providers[route.provider_index].as_ref();

        let authorized_context = self.authorize_context(context, &provider_name, &routed_model).await?;

        // Create a modified request with the routed model name
        let mut modified_request = request;
        modified_request.model = routed_model.clone();

        // Call provider with unified types directly
        let unified_response = provider.chat_completion(modified_request, &authorized_context).await?;

        self.record_usage(&provider_name, &routed_model, &unified_response.usage).await;
        self.emit_usage_receipt(&authorized_context, &provider_name, &routed_model, &unified_response.usage);

        // Restore the full model name with provider prefix in the response
        let mut final_response = unified_response;
        final_response.model = original_model;

        Ok(final_response)
    }

    /// Process a unified streaming chat completion request (protocol-agnostic).
    pub async fn unified_completions_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        // Resolve routing for the requested model
        let original_model = request.model.clone();
        let route = self.resolve_model_route_for_request(&original_model).await?;
        let provider_name = route.provider_name().to_string();
        let routed_model = route.model_name.to_string();

        self.enforce_budget_for(&provider_name, &routed_model, request.max_tokens).await?;

        let provider = self.shared.providers[route.provider_index].as_ref();

        // Check if provider supports streaming
        if !provider.supports_streaming() {
            log::debug!("Provider '{provider_name}' does not support streaming");
            return Err(LlmError::StreamingNotSupported);
        }

        let authorized_context = self.authorize_context(context, &provider_name, &routed_model).await?;
        let delegation = authorized_context.client_identity.clone();

        // Create a modified request with the stripped model name
        let mut modified_request = request;
        modified_request.model = routed_model.clone();

        // Get the stream from the provider
        let stream = provider.chat_completion_stream(modified_request, &authorized_context).await?;

        let shared = self.shared.clone();

        // Transform the stream to restore the full model name with prefix and,
        // at the terminal chunk, record usage (§4.8: at the terminal `complete`
        // of a stream) and emit the authorization usage receipt.
        let transformed_stream = stream.map(move |chunk_result| {
            chunk_result.map(|mut chunk| {
                chunk.model = original_model.clone().into();

                if let Some(usage) = chunk.usage.clone() {
                    let shared = shared.clone();
                    let provider_name = provider_name.clone();
                    let routed_model = routed_model.clone();
                    let delegation = delegation.clone();

                    tokio::spawn(async move {
                        record_usage_for(&shared, &provider_name, &routed_model, &usage).await;
                        emit_usage_receipt_for(&shared, delegation.as_ref(), &provider_name, &routed_model, &usage).await;
                    });
                }

                chunk
            })
        });

        Ok(Box::pin(transformed_stream))
    }

    /// Count tokens for a would-be request without sending it upstream.
    pub async fn unified_count_tokens(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<CountTokensResponse> {
        let route = self.resolve_model_route_for_request(&request.model).await?;
        let provider = self.shared.providers[route.provider_index].as_ref();

        let mut modified_request = request;
        modified_request.model = route.model_name.to_string();

        provider.count_tokens(modified_request, context).await
    }

    /// Aggregated usage for `[start, end)`.
    pub(crate) async fn usage_summary(&self, start: jiff::Timestamp, end: jiff::Timestamp) -> anyhow::Result<crate::usage::UsageSummary> {
        self.shared.usage.summary(start, end).await
    }

    /// Paginated usage record listing for `[start, end)`.
    pub(crate) async fn usage_list(&self, start: jiff::Timestamp, end: jiff::Timestamp, limit: usize, offset: usize) -> anyhow::Result<UsagePage> {
        self.shared.usage.list(start, end, limit, offset).await
    }

    /// Cost grouped by provider for `[start, end)`.
    pub(crate) async fn usage_cost_by_provider(&self, start: jiff::Timestamp, end: jiff::Timestamp) -> anyhow::Result<Vec<(String, f64)>> {
        self.shared.usage.cost_by_provider(start, end).await
    }

    /// Cost grouped by model for `[start, end)`.
    pub(crate) async fn usage_cost_by_model(&self, start: jiff::Timestamp, end: jiff::Timestamp) -> anyhow::Result<Vec<(String, f64)>> {
        self.shared.usage.cost_by_model(start, end).await
    }

    /// Hourly cost/token breakdown for the 24 hours ending at `now`.
    pub(crate) async fn usage_hourly_breakdown(&self, now: jiff::Timestamp) -> anyhow::Result<Vec<crate::usage::HourlyBucket>> {
        self.shared.usage.hourly_breakdown(now).await
    }

    /// Current budget status for a zero-cost probe (no pending request).
    pub(crate) async fn budget_status(&self) -> anyhow::Result<BudgetStatus> {
        self.shared.budget.get_budget_status(0.0).await
    }

    /// Updates the spend limit.
    pub(crate) async fn set_budget(&self, amount_usd: Option<f64>, alert_only: bool) -> anyhow::Result<()> {
        self.shared.budget.set_limit(amount_usd, alert_only).await
    }

    /// Current spend limit configuration.
    #[cfg_attr(not(test), allow(dead_code))]
    pub(crate) async fn budget_limit(&self) -> anyhow::Result<SpendLimit> {
        self.shared.budget.get_limit().await
    }

    /// Pre-dispatch budget gate (§4.8). The estimated cost is the output side
    /// of the request's `max_tokens` at the routed provider/model's price,
    /// which is the only token count known before the upstream call returns;
    /// `0` when no pricing or `max_tokens` is available, so the gate only
    /// blocks a request that has already pushed the month over budget.
    async fn enforce_budget_for(&self, provider: &str, model: &str, max_tokens: Option<u32>) -> crate::Result<()> {
        let estimated = match max_tokens {
            Some(max_tokens) => self
                .shared
                .pricing
                .calculate_cost(provider, model, 0, u64::from(max_tokens), 0, 0)
                .await
                .map(|cost| cost.total_cost)
                .unwrap_or(0.0),
            None => 0.0,
        };

        self.shared.budget.enforce_budget(estimated).await
    }

    /// Computes cost via the pricing catalog and persists the usage record.
    async fn record_usage(&self, provider: &str, model: &str, usage: &crate::messages::unified::UnifiedUsage) {
        record_usage_for(&self.shared, provider, model, usage).await;
    }

    /// Runs the trust-root authorization check chain (§4.6) when enabled,
    /// returning a context carrying the resolved key. Without an adapter
    /// configured, this is a plain clone: routing is unaffected.
    async fn authorize_context(&self, context: &RequestContext, provider_name: &str, model: &str) -> crate::Result<RequestContext> {
        let Some(auth) = &self.shared.authorization else {
            return Ok(context.clone());
        };

        let identity = context
            .client_identity
            .as_ref()
            .ok_or(LlmError::DelegateNotPermitted)?;

        let authorized_key = auth
            .resolve_api_key(identity.owner(), &identity.client_id, provider_name, model)
            .await?;

        let mut authorized = context.clone();
        authorized.authorized_key = Some(authorized_key);
        Ok(authorized)
    }

    /// Fires the best-effort post-completion usage receipt (§4.6) off the
    /// request path when authorization is enabled and identity is known.
    fn emit_usage_receipt(&self, context: &RequestContext, provider: &str, model: &str, usage: &crate::messages::unified::UnifiedUsage) {
        if self.shared.authorization.is_none() {
            return;
        }

        let shared = self.shared.clone();
        let identity = context.client_identity.clone();
        let provider = provider.to_string();
        let model = model.to_string();
        let usage = usage.clone();

        tokio::spawn(async move {
            emit_usage_receipt_for(&shared, identity.as_ref(), &provider, &model, &usage).await;
        });
    }

    /// Whether the provider at `index` is eligible for automatic selection
    /// (pattern routes, price fallback): it has its own usable credential, or
    /// trust-root authorization is enabled and resolves one per request
    /// regardless of static configuration (§4.4/§4.6).
    fn provider_available(&self, index: usize) -> bool {
        self.shared.providers[index].is_configured() || self.shared.authorization.is_some()
    }

    /// Get a provider by name.
    fn resolve_model_route<'a>(&'a self, requested_model: &'a str) -> crate::Result<ResolvedModelRoute<'a, 'a>> {
        if let Some((provider_name, model_name)) = requested_model.split_once('/') {
            if model_name.is_empty() {
                return Err(LlmError::InvalidModelFormat(requested_model.to_string()));
            }

            let Some(provider_index) = self
                .shared
                .providers
                .iter()
                .position(|provider| provider.name() == provider_name)
            else {
                log::error!(
                    "Provider '{provider_name}' not found. Available providers: [{providers}]",
                    providers = self.shared.providers.iter().map(|p| p.name()).join(", ")
                );

                return Err(LlmError::ProviderNotFound(provider_name.to_string()));
            };

            return Ok(ResolvedModelRoute {
                providers: &self.shared.providers,
                provider_index,
                model_name,
                source: ModelRouteSource::LegacyPrefix,
            });
        }

        log::debug!(
            "Checking {} pattern routes for model '{}'",
            self.shared.pattern_routes.len(),
            requested_model
        );

        if let Some(route) = self.shared.pattern_routes.iter().find(|route| {
            let matches = route.regex.is_match(requested_model);
            log::debug!(
                "Pattern '{}' match for '{}': {}",
                route.regex.as_str(),
                requested_model,
                matches
            );
            matches && self.provider_available(route.provider_index)
        }) {
            log::debug!("Model '{}' matched pattern route", requested_model);
            return Ok(ResolvedModelRoute {
                providers: &self.shared.providers,
                provider_index: route.provider_index,
                model_name: requested_model,
                source: ModelRouteSource::Pattern,
            });
        }

        log::warn!("Model '{requested_model}' did not match any configured provider patterns");

        Err(LlmError::ModelNotFound(requested_model.to_string()))
    }

    /// Resolves a route the same way [`Self::resolve_model_route`] does, and
    /// when neither a prefix nor a pattern matches, falls back to the
    /// cheapest configured provider that has pricing for the model (§4.4
    /// step 2). A rule-matching provider is always preferred over price,
    /// whatever the relative cost.
    async fn resolve_model_route_for_request<'a>(&'a self, requested_model: &'a str) -> crate::Result<ResolvedModelRoute<'a, 'a>> {
        match self.resolve_model_route(requested_model) {
            Err(LlmError::ModelNotFound(_)) => {}
            result => return result,
        }

        let provider_names: Vec<&str> = self
            .shared
            .providers
            .iter()
            .enumerate()
            .filter(|(index, _)| self.provider_available(*index))
            .map(|(_, provider)| provider.name())
            .collect();
        let cheapest = self
            .shared
            .pricing
            .cheapest_provider(requested_model, provider_names.into_iter())
            .await
            .ok_or_else(|| LlmError::ModelNotFound(requested_model.to_string()))?;

        let provider_index = self
            .shared
            .providers
            .iter()
            .position(|provider| provider.name() == cheapest)
            .ok_or_else(|| LlmError::ModelNotFound(requested_model.to_string()))?;

        log::debug!("Model '{requested_model}' routed to '{cheapest}' by price selection");

        Ok(ResolvedModelRoute {
            providers: &self.shared.providers,
            provider_index,
            model_name: requested_model,
            source: ModelRouteSource::PriceFallback,
        })
    }
}

/// Computes cost via the pricing catalog and persists the usage record,
/// logging a warning and recording zero cost when pricing is unavailable.
async fn record_usage_for(shared: &LlmServerInner, provider: &str, model: &str, usage: &crate::messages::unified::UnifiedUsage) {
    let cache_write = u64::from(usage.cache_write_tokens.unwrap_or(0));
    let cache_read = u64::from(usage.cache_read_tokens.unwrap_or(0));

    let cost = shared
        .pricing
        .calculate_cost(
            provider,
            model,
            u64::from(usage.prompt_tokens),
            u64::from(usage.completion_tokens),
            cache_write,
            cache_read,
        )
        .await;

    if cost.is_none() {
        log::warn!("no pricing entry for '{provider}/{model}'; recording usage at zero cost");
    }

    let record = UsageRecord::new(
        provider.to_string(),
        model.to_string(),
        u64::from(usage.prompt_tokens),
        cache_write,
        cache_read,
        u64::from(usage.completion_tokens),
        cost,
    );

    if let Err(error) = shared.usage.record(record).await {
        log::error!("failed to persist usage record: {error}");
    }
}

/// Emits the authorization adapter's post-completion usage receipt. A no-op
/// when authorization is disabled or the caller's identity is unknown;
/// emission failures are the adapter's responsibility to log, never the
/// request's to fail (§4.6).
async fn emit_usage_receipt_for(
    shared: &LlmServerInner,
    identity: Option<&context::ClientIdentity>,
    provider: &str,
    model: &str,
    usage: &crate::messages::unified::UnifiedUsage,
) {
    let Some(auth) = &shared.authorization else {
        return;
    };

    let Some(identity) = identity else {
        return;
    };

    let receipt = crate::auth::UsageReceipt {
        request_hash: uuid::Uuid::new_v4().to_string(),
        owner: identity.owner().to_string(),
        delegate: identity.client_id.clone(),
        provider_id: provider.to_string(),
        model_id: model.to_string(),
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    };

    auth.emit_usage_receipt(receipt).await;
}

impl LlmService for LlmServer {
    async fn models(&self) -> ModelsResponse {
        let models = self.shared.model_discovery.get_all_models(&self.shared.providers).await;

        ModelsResponse {
            object: ObjectType::List,
            data: models,
        }
    }

    async fn completions(&self, request: UnifiedRequest, context: &RequestContext) -> crate::Result<UnifiedResponse> {
        self.unified_completions(request, context).await
    }

    async fn completions_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        self.unified_completions_stream(request, context).await
    }

    async fn count_tokens(&self, request: UnifiedRequest, context: &RequestContext) -> crate::Result<CountTokensResponse> {
        self.unified_count_tokens(request, context).await
    }
}

pub(super) fn build_pattern_routes(config: &LlmConfig, providers: &[Box<dyn Provider>]) -> Vec<ModelPatternRoute> {
    let mut routes = Vec::new();

    for (name, provider_config) in &config.providers {
        let Some(pattern) = provider_config.model_pattern() else {
            log::debug!("Provider '{name}' has no model_pattern configured");
            continue;
        };

        let Some(provider_index) = providers.iter().position(|provider| provider.name() == name) else {
            log::warn!("Configured model pattern for provider '{name}' but provider failed to initialize");
            continue;
        };

        log::debug!(
            "Adding pattern route for provider '{name}' with pattern: {}",
            pattern.pattern()
        );

        let priority = config::SELECTION_RULE_ORDER
            .iter()
            .position(|kind| *kind == provider_config.provider_type())
            .unwrap_or(config::SELECTION_RULE_ORDER.len());

        routes.push((priority, ModelPatternRoute {
            provider_index,
            regex: pattern.regex().clone(),
        }));
    }

    // §4.4 step 1: when more than one rule-matching provider's pattern could
    // match a model, try them in SELECTION_RULE_ORDER rather than
    // configuration-declaration order. `sort_by_key` is stable, so providers
    // tied on priority (e.g. two custom `openai-compatible` endpoints) keep
    // their relative declaration order.
    routes.sort_by_key(|(priority, _)| *priority);

    let routes: Vec<ModelPatternRoute> = routes.into_iter().map(|(_, route)| route).collect();

    log::debug!("Built {} pattern routes", routes.len());
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indoc::indoc;
    use insta::assert_debug_snapshot;
    use std::sync::Arc;

    struct DummyProvider {
        name: String,
        configured: bool,
    }

    impl DummyProvider {
        fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                configured: true,
            }
        }

        fn new_unconfigured(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                configured: false,
            }
        }
    }

    #[async_trait]
    impl Provider for DummyProvider {
        async fn chat_completion(
            &self,
            _request: crate::messages::unified::UnifiedRequest,
            _context: &crate::request::RequestContext,
        ) -> crate::Result<crate::messages::unified::UnifiedResponse> {
            Err(crate::error::LlmError::InternalError(None))
        }

        async fn chat_completion_stream(
            &self,
            _request: crate::messages::unified::UnifiedRequest,
            _context: &crate::request::RequestContext,
        ) -> crate::Result<crate::provider::ChatCompletionStream> {
            Err(crate::error::LlmError::StreamingNotSupported)
        }

        async fn list_models(&self) -> anyhow::Result<Vec<crate::messages::openai::Model>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn supports_streaming(&self) -> bool {
            false
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    struct AllowAllTrustRoot;

    #[async_trait]
    impl crate::auth::TrustRootClient for AllowAllTrustRoot {
        async fn is_delegate_permitted(&self, _owner: &str, _delegate: &str) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn is_model_permitted(&self, _owner: &str, _provider_id: &str, _model_id: &str) -> anyhow::Result<bool> {
            Ok(true)
        }

        async fn get_secret_ciphertext(&self, _owner: &str, _provider_id: &str) -> anyhow::Result<crate::auth::SecretLookup> {
            Err(anyhow::anyhow!("no secret configured in this fake"))
        }

        async fn emit_usage_receipt(&self, _receipt: crate::auth::UsageReceipt) {}
    }

    fn build_test_server(toml: &str) -> LlmServer {
        let config: LlmConfig = toml::from_str(toml).expect("valid LLM config");
        let provider_names: Vec<String> = config.providers.keys().cloned().collect();

        let providers: Vec<Box<dyn Provider>> = provider_names
            .iter()
            .map(|name| {
                let provider_config = &config.providers[name];
                let configured = provider_config.api_key().is_some() || provider_config.forward_token();

                if configured {
                    Box::new(DummyProvider::new(name.clone())) as Box<dyn Provider>
                } else {
                    Box::new(DummyProvider::new_unconfigured(name.clone())) as Box<dyn Provider>
                }
            })
            .collect();

        let pattern_routes = build_pattern_routes(&config, &providers);
        let model_discovery = ModelDiscovery::new();
        let pricing = crate::pricing::PricingCatalog::new(std::path::PathBuf::from("/nonexistent"));
        let store = crate::store::Store::open_in_memory().expect("in-memory store");
        let usage = crate::usage::UsageStore::new(store.clone());
        let budget = crate::budget::BudgetEnforcer::new(store.clone(), crate::usage::UsageStore::new(store));
        let adapter_registry = AdapterRegistry::new(&config.protocols);

        LlmServer {
            shared: Arc::new(LlmServerInner {
                providers,
                config,
                pattern_routes,
                model_discovery,
                pricing,
                usage,
                budget,
                authorization: None,
                adapter_registry,
            }),
        }
    }

    #[test]
    fn routes_prefixed_models_using_legacy_format() {
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
            model_pattern = "gpt-4.*"
        "#});

        let route = server
            .resolve_model_route("openai/gpt-4o-mini")
            .expect("route should resolve");

        assert_debug_snapshot!((&route.provider_name(), route.model_name, route.source), @r###"
        (
            "openai",
            "gpt-4o-mini",
            LegacyPrefix,
        )
        "###);
    }

    #[test]
    fn routes_models_with_case_insensitive_pattern_match() {
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
            model_pattern = "gpt-4o.*"

            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_pattern = "claude.*"
        "#});

        let route = server.resolve_model_route("GPT-4O-MINI").expect("route should resolve");

        assert_debug_snapshot!((&route.provider_name(), route.model_name, route.source), @r###"
        (
            "openai",
            "GPT-4O-MINI",
            Pattern,
        )
        "###);
    }

    #[test]
    fn respects_config_order_for_pattern_matches() {
        let server = build_test_server(indoc! {r#"
            [providers.alpha]
            type = "openai"
            api_key = "test"
            model_pattern = "^gpt-4.*"

            [providers.omega]
            type = "openai"
            api_key = "test"
            model_pattern = "^gpt-4o-mini$"
        "#});

        let route = server.resolve_model_route("gpt-4o-mini").expect("route should resolve");

        assert_debug_snapshot!((&route.provider_name(), route.model_name, route.source), @r###"
        (
            "alpha",
            "gpt-4o-mini",
            Pattern,
        )
        "###);
    }

    #[test]
    fn prefers_selection_rule_order_over_declaration_order() {
        // OpenAI is declared first, but Anthropic ranks earlier in
        // `SELECTION_RULE_ORDER` (§4.4 step 1), so it should win even though
        // it's configured second.
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
            model_pattern = ".*"

            [providers.anthropic]
            type = "anthropic"
            api_key = "test"
            model_pattern = ".*"
        "#});

        let route = server.resolve_model_route("claude-3-5-sonnet").expect("route should resolve");

        assert_eq!(route.provider_name(), "anthropic");
    }

    #[test]
    fn returns_error_when_model_cannot_be_resolved() {
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
            model_pattern = "gpt-4.*"
        "#});

        let error = server
            .resolve_model_route("unknown-model")
            .expect_err("route resolution should fail");

        let message = error.to_string();
        insta::assert_snapshot!(message, @r###"Model 'unknown-model' not found"###);
    }

    #[test]
    fn pattern_routes_skip_unconfigured_providers() {
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            model_pattern = "gpt-4.*"

            [providers.openrouter]
            type = "openrouter"
            api_key = "test"
            model_pattern = "gpt-4.*"
        "#});

        let route = server.resolve_model_route("gpt-4o-mini").expect("route should resolve");

        assert_eq!(route.provider_name(), "openrouter");
    }

    #[tokio::test]
    async fn authorize_context_passes_through_when_authorization_disabled() {
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
            model_pattern = ".*"
        "#});

        let context = RequestContext::default();
        let authorized = server.authorize_context(&context, "openai", "gpt-4o").await.unwrap();

        assert!(authorized.authorized_key.is_none());
    }

    #[tokio::test]
    async fn authorize_context_fails_closed_without_client_identity() {
        let mut server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
            model_pattern = ".*"
        "#});

        Arc::get_mut(&mut server.shared).unwrap().authorization =
            Some(crate::auth::AuthorizationAdapter::new(Box::new(AllowAllTrustRoot), x25519_dalek::StaticSecret::from([1u8; 32])));

        let context = RequestContext::default();
        let error = server
            .authorize_context(&context, "openai", "gpt-4o")
            .await
            .expect_err("missing client identity should fail closed");

        assert_eq!(error.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
