//! Builder that turns configuration into a running set of provider clients.

use std::sync::Arc;

use config::Config;

use crate::{
    auth::{AuthorizationAdapter, HttpTrustRootClient, decode_private_key},
    budget::BudgetEnforcer,
    error::LlmError,
    http_client::http_client,
    messages::format::AdapterRegistry,
    pricing::PricingCatalog,
    provider::{Provider, anthropic::AnthropicProvider, google::GoogleProvider, openai::OpenAIProvider},
    server::{LlmHandler, LlmServer, LlmServerInner},
    store::Store,
    usage::UsageStore,
};

pub(crate) struct LlmServerBuilder<'a> {
    config: &'a Config,
}

impl<'a> LlmServerBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub async fn build(self) -> crate::Result<LlmHandler> {
        log::debug!(
            "Initializing LLM server with {} providers",
            self.config.llm.providers.len()
        );

        let mut providers = Vec::with_capacity(self.config.llm.providers.len());

        for (name, provider_config) in self.config.llm.providers.clone().into_iter() {
            log::debug!("Initializing provider: {name}");

            let provider: Box<dyn Provider> = match provider_config {
                config::LlmProviderConfig::Openai(api_config)
                | config::LlmProviderConfig::OpenRouter(api_config)
                | config::LlmProviderConfig::Xai(api_config)
                | config::LlmProviderConfig::Zai(api_config)
                | config::LlmProviderConfig::Ollama(api_config)
                | config::LlmProviderConfig::OpenAiCompatible(api_config) => {
                    Box::new(OpenAIProvider::new(name.clone(), api_config)?)
                }
                config::LlmProviderConfig::Anthropic(api_config) => {
                    Box::new(AnthropicProvider::new(name.clone(), api_config)?)
                }
                config::LlmProviderConfig::Google(api_config) => {
                    Box::new(GoogleProvider::new(name.clone(), api_config)?)
                }
            };

            providers.push(provider);
        }

        if providers.is_empty() {
            return Err(LlmError::InternalError(Some(
                "Failed to initialize any LLM providers.".to_string(),
            )));
        }

        log::debug!("LLM server initialized with {} active provider(s)", providers.len());

        let pattern_routes = super::build_pattern_routes(&self.config.llm, &providers);
        let model_discovery = super::ModelDiscovery::new();
        let pricing = PricingCatalog::new(self.config.pricing.directory.clone());

        let store = Store::open(&self.config.usage.db_path).map_err(|error| {
            LlmError::InternalError(Some(format!(
                "failed to open usage database at {:?}: {error}",
                self.config.usage.db_path
            )))
        })?;
        let usage = UsageStore::new(store.clone());
        let budget = BudgetEnforcer::new(store.clone(), UsageStore::new(store));
        let authorization = self.build_authorization()?;
        let adapter_registry = AdapterRegistry::new(&self.config.llm.protocols);

        let server = LlmServer {
            shared: Arc::new(LlmServerInner {
                providers,
                config: self.config.llm.clone(),
                pattern_routes,
                model_discovery,
                pricing,
                usage,
                budget,
                authorization,
                adapter_registry,
            }),
        };

        Ok(LlmHandler::new(server))
    }

    /// Builds the authorization adapter from `[authorization]` when enabled.
    /// A misconfigured `trust_root_url`/`decryption_key` fails startup rather
    /// than the first request, since authorization is fail-closed by design.
    fn build_authorization(&self) -> crate::Result<Option<AuthorizationAdapter>> {
        let config = &self.config.authorization;

        if !config.enabled {
            return Ok(None);
        }

        let trust_root_url = config
            .trust_root_url
            .clone()
            .ok_or_else(|| LlmError::InternalError(Some("authorization.enabled requires authorization.trust_root_url".to_string())))?;

        let decryption_key = config
            .decryption_key
            .as_ref()
            .ok_or_else(|| LlmError::InternalError(Some("authorization.enabled requires authorization.decryption_key".to_string())))?;

        let private_key = decode_private_key(decryption_key)?;
        let client = HttpTrustRootClient::new(http_client(), trust_root_url);

        Ok(Some(AuthorizationAdapter::new(Box::new(client), private_key)))
    }
}
