//! Model Catalog (C2).
//!
//! Enumerates the models available per provider per endpoint dialect. Static
//! entries come from JSON files on disk; the "openrouter" aggregator's
//! models are instead taken live from the pricing catalog, since OpenRouter
//! fronts hundreds of models that aren't worth hand-maintaining in a file.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{cache::TtlCache, pricing::PricingCatalog};

const CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 500;

/// The aggregator provider whose catalog is sourced from live pricing data
/// rather than a static file.
const LIVE_AGGREGATOR: &str = "openrouter";

/// Endpoint dialect a catalog entry is listed under; mirrors the three JSON
/// files the catalog loads (`chat_completions.json`, `messages.json`,
/// `responses.json`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ChatCompletions,
    Messages,
    Responses,
}

impl Endpoint {
    const ALL: [Self; 3] = [Self::ChatCompletions, Self::Messages, Self::Responses];

    fn file_name(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat_completions.json",
            Self::Messages => "messages.json",
            Self::Responses => "responses.json",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat_completions",
            Self::Messages => "messages",
            Self::Responses => "responses",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    providers: Vec<CatalogProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogProviderEntry {
    provider: String,
    models: Vec<String>,
}

/// Where a catalog entry's model list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    /// Listed explicitly in the on-disk JSON catalog.
    Static,
    /// Derived from the live pricing catalog (the OpenRouter aggregator).
    LivePricing,
}

#[derive(Debug, Clone)]
pub struct ModelCatalogEntry {
    pub id: String,
    pub provider: String,
    pub endpoint: Endpoint,
    pub pricing: Option<crate::pricing::ModelPricing>,
    pub source: CatalogSource,
}

/// Filters accepted by [`ModelCatalog::list`]. `limit` is clamped to
/// [`MAX_LIMIT`] and defaults to [`DEFAULT_LIMIT`] when `None`.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalogFilter {
    pub provider: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub struct ModelCatalogPage {
    pub total: usize,
    pub items: Vec<ModelCatalogEntry>,
}

type Entries = Vec<(String, Endpoint, Vec<String>)>;

pub(crate) struct ModelCatalog {
    directory: PathBuf,
    cache: TtlCache<Entries>,
}

impl ModelCatalog {
    pub(crate) fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            cache: TtlCache::new(CACHE_TTL),
        }
    }

    async fn load_static(&self) -> Entries {
        let directory = self.directory.clone();

        self.cache
            .get_or_load(move || async move { Ok::<_, std::convert::Infallible>(load_directory(&directory)) })
            .await
            .unwrap_or_default()
    }

    /// Lists catalog entries matching `filter`, attaching pricing where the
    /// pricing catalog has a matching entry.
    pub(crate) async fn list(&self, filter: &ModelCatalogFilter, pricing: &PricingCatalog) -> ModelCatalogPage {
        let static_entries = self.load_static().await;
        let mut all = Vec::new();

        for (provider, endpoint, models) in &static_entries {
            if provider == LIVE_AGGREGATOR {
                for (live_provider, model) in pricing.search("").await {
                    if live_provider != LIVE_AGGREGATOR {
                        continue;
                    }

                    all.push(ModelCatalogEntry {
                        id: model.clone(),
                        provider: provider.clone(),
                        endpoint: *endpoint,
                        pricing: pricing.get_model_pricing(provider, &model).await,
                        source: CatalogSource::LivePricing,
                    });
                }

                continue;
            }

            for model in models {
                all.push(ModelCatalogEntry {
                    id: model.clone(),
                    provider: provider.clone(),
                    endpoint: *endpoint,
                    pricing: pricing.get_model_pricing(provider, model).await,
                    source: CatalogSource::Static,
                });
            }
        }

        if let Some(provider) = &filter.provider {
            all.retain(|entry| &entry.provider == provider);
        }

        if let Some(endpoint) = filter.endpoint {
            all.retain(|entry| entry.endpoint == endpoint);
        }

        if let Some(search) = &filter.search {
            let search = search.to_lowercase();
            all.retain(|entry| entry.id.to_lowercase().contains(&search));
        }

        all.sort_by(|a, b| (&a.provider, &a.id).cmp(&(&b.provider, &b.id)));

        let total = all.len();
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let items = all.into_iter().skip(filter.offset).take(limit).collect();

        ModelCatalogPage { total, items }
    }
}

fn load_directory(directory: &std::path::Path) -> Entries {
    let mut entries = Entries::new();

    for endpoint in Endpoint::ALL {
        let path = directory.join(endpoint.file_name());

        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<CatalogFile>(&contents) {
                Ok(file) => {
                    for provider_entry in file.providers {
                        entries.push((provider_entry.provider, endpoint, provider_entry.models));
                    }
                }
                Err(error) => log::warn!("failed to parse model catalog file {path:?}: {error}"),
            },
            Err(error) => {
                log::debug!("model catalog file {path:?} unreadable, skipping ({} endpoint): {error}", endpoint.label());
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_pricing() -> PricingCatalog {
        PricingCatalog::new(PathBuf::from("/nonexistent"))
    }

    #[tokio::test]
    async fn paginates_and_filters_by_provider() {
        let catalog = ModelCatalog::new(PathBuf::from("/nonexistent"));
        catalog.cache.preload(vec![
            (
                "openai".to_string(),
                Endpoint::ChatCompletions,
                vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()],
            ),
            (
                "anthropic".to_string(),
                Endpoint::Messages,
                vec!["claude-3-5-sonnet-20241022".to_string()],
            ),
        ]).await;

        let pricing = fixture_pricing();

        let page = catalog
            .list(
                &ModelCatalogFilter {
                    provider: Some("openai".to_string()),
                    ..Default::default()
                },
                &pricing,
            )
            .await;

        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|entry| entry.provider == "openai"));
    }

    #[tokio::test]
    async fn respects_limit_and_offset() {
        let catalog = ModelCatalog::new(PathBuf::from("/nonexistent"));
        let models: Vec<String> = (0..10).map(|i| format!("model-{i}")).collect();
        catalog.cache.preload(vec![("openai".to_string(), Endpoint::ChatCompletions, models)]).await;

        let pricing = fixture_pricing();

        let page = catalog
            .list(
                &ModelCatalogFilter {
                    limit: Some(3),
                    offset: 5,
                    ..Default::default()
                },
                &pricing,
            )
            .await;

        assert_eq!(page.total, 10);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].id, "model-5");
    }
}
