//! Pricing Catalog (C1).
//!
//! Loads per-provider pricing tables from YAML files on disk and turns raw
//! token counts into a cost breakdown. Pricing numbers are USD per million
//! tokens, per the wire format in the specification's external interfaces.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::cache::TtlCache;

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Per-model pricing, normalized from whatever aliases the provider's YAML
/// file used for the cache-bucket fields.
#[derive(Debug, Clone, Default)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_write: Option<f64>,
    pub cache_read: Option<f64>,
}

/// Raw per-model entry as it appears in a provider's YAML file, before the
/// Anthropic-specific cache-bucket aliases are normalized away.
#[derive(Debug, Clone, Deserialize)]
struct RawModelPricing {
    input: f64,
    output: f64,
    #[serde(default)]
    cache_write: Option<f64>,
    #[serde(default)]
    cache_read: Option<f64>,
    /// Anthropic: 5-minute prompt cache write rate.
    #[serde(default, rename = "5m_cache_write")]
    cache_write_5m: Option<f64>,
    /// Anthropic: 1-hour prompt cache write rate.
    #[serde(default, rename = "1h_cache_write")]
    cache_write_1h: Option<f64>,
}

impl From<RawModelPricing> for ModelPricing {
    fn from(raw: RawModelPricing) -> Self {
        Self {
            input: raw.input,
            output: raw.output,
            // `cache_write` wins if present; otherwise prefer the 5-minute
            // bucket over the 1-hour one, per the pricing spec.
            cache_write: raw.cache_write.or(raw.cache_write_5m).or(raw.cache_write_1h),
            cache_read: raw.cache_read,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PricingFile {
    #[serde(default)]
    provider: String,
    currency: String,
    unit: String,
    models: HashMap<String, RawModelPricing>,
    #[serde(default)]
    #[allow(dead_code)]
    metadata: serde_json::Value,
}

/// One provider's normalized pricing table, keyed by model name exactly as
/// it appears in the YAML file.
#[derive(Debug, Clone)]
pub struct ProviderPricing {
    pub currency: String,
    pub unit: String,
    models: HashMap<String, ModelPricing>,
}

/// Cost for a single token bucket, plus the grand total, all in the
/// provider's pricing currency and rounded to 6 decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub cache_write_cost: f64,
    pub cache_read_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub currency: String,
    pub unit: String,
}

type Catalog = HashMap<String, ProviderPricing>;

/// Loads and caches the pricing catalog from `directory`, one `<provider>.yaml`
/// file per provider.
pub(crate) struct PricingCatalog {
    directory: PathBuf,
    cache: TtlCache<Catalog>,
}

impl PricingCatalog {
    pub(crate) fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            cache: TtlCache::new(CACHE_TTL),
        }
    }

    /// Loads every `*.yaml` file in the pricing directory. A single
    /// malformed file only drops that provider's pricing; the rest of the
    /// catalog still loads.
    pub(crate) async fn load_all(&self) -> Catalog {
        let directory = self.directory.clone();

        self.cache
            .get_or_load(move || async move { Ok::<_, std::convert::Infallible>(load_directory(&directory)) })
            .await
            .unwrap_or_default()
    }

    /// Looks up pricing for `model` under `provider`, trying the model name
    /// as given first and, on a miss, a version with any `vendor/` prefix
    /// stripped — aggregator catalogs (OpenRouter) key entries by the
    /// prefixed form, so both directions need to be tried.
    pub(crate) async fn get_model_pricing(&self, provider: &str, model: &str) -> Option<ModelPricing> {
        let catalog = self.load_all().await;
        let table = catalog.get(provider)?;

        if let Some(pricing) = table.models.get(model) {
            return Some(pricing.clone());
        }

        let normalized = normalize_model_name(model);

        table.models.get(normalized.as_ref()).cloned()
    }

    /// Case-insensitive substring search over model names across every
    /// configured provider.
    pub(crate) async fn search(&self, query: &str) -> Vec<(String, String)> {
        let query = query.to_lowercase();
        let catalog = self.load_all().await;

        let mut matches: Vec<(String, String)> = catalog
            .iter()
            .flat_map(|(provider, table)| {
                table
                    .models
                    .keys()
                    .filter(|model| model.to_lowercase().contains(&query))
                    .map(|model| (provider.clone(), model.clone()))
            })
            .collect();

        matches.sort();
        matches
    }

    /// Computes the cost breakdown for a request, or `None` when no pricing
    /// entry is known for `(provider, model)` — callers fall back to
    /// recording zero-cost usage with a warning in that case.
    pub(crate) async fn calculate_cost(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        cache_write_tokens: u64,
        cache_read_tokens: u64,
    ) -> Option<CostBreakdown> {
        let pricing = self.get_model_pricing(provider, model).await?;
        let catalog = self.load_all().await;
        let table = catalog.get(provider)?;

        let input_cost = round6(bucket_cost(input_tokens, pricing.input));
        let output_cost = round6(bucket_cost(output_tokens, pricing.output));
        let cache_write_cost = pricing
            .cache_write
            .map(|rate| round6(bucket_cost(cache_write_tokens, rate)))
            .unwrap_or(0.0);
        let cache_read_cost = pricing
            .cache_read
            .map(|rate| round6(bucket_cost(cache_read_tokens, rate)))
            .unwrap_or(0.0);

        let total_cost = round6(input_cost + cache_write_cost + cache_read_cost + output_cost);

        Some(CostBreakdown {
            input_cost,
            cache_write_cost,
            cache_read_cost,
            output_cost,
            total_cost,
            currency: table.currency.clone(),
            unit: table.unit.clone(),
        })
    }

    /// The cheapest configured provider (by `input + output` per-million
    /// rate) that has pricing for `model`, among `configured_providers`.
    /// Used by the router's price-selection fallback (§4.4 step 2).
    pub(crate) async fn cheapest_provider<'a>(
        &self,
        model: &str,
        configured_providers: impl Iterator<Item = &'a str>,
    ) -> Option<String> {
        let catalog = self.load_all().await;
        let normalized = normalize_model_name(model);

        let mut best: Option<(String, f64)> = None;

        for provider in configured_providers {
            let Some(table) = catalog.get(provider) else {
                continue;
            };

            let pricing = table
                .models
                .get(model)
                .or_else(|| table.models.get(normalized.as_ref()));

            let Some(pricing) = pricing else {
                continue;
            };

            let rate = pricing.input + pricing.output;

            if best.as_ref().is_none_or(|(_, best_rate)| rate < *best_rate) {
                best = Some((provider.to_string(), rate));
            }
        }

        best.map(|(provider, _)| provider)
    }
}

fn bucket_cost(tokens: u64, rate_per_million: f64) -> f64 {
    (tokens as f64 / 1_000_000.0) * rate_per_million
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Strips a `provider/` prefix from a model name for pricing lookup, e.g.
/// `anthropic/claude-3-5-sonnet-20241022` -> `claude-3-5-sonnet-20241022`.
fn normalize_model_name(model: &str) -> std::borrow::Cow<'_, str> {
    match model.split_once('/') {
        Some((_, rest)) if !rest.is_empty() => std::borrow::Cow::Borrowed(rest),
        _ => std::borrow::Cow::Borrowed(model),
    }
}

fn load_directory(directory: &std::path::Path) -> Catalog {
    let mut catalog = Catalog::new();

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            log::warn!("pricing directory {directory:?} unreadable: {error}");
            return catalog;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
            continue;
        }

        match load_file(&path) {
            Ok((provider, pricing)) => {
                catalog.insert(provider, pricing);
            }
            Err(error) => {
                log::warn!("failed to load pricing file {path:?}: {error}");
            }
        }
    }

    catalog
}

fn load_file(path: &std::path::Path) -> anyhow::Result<(String, ProviderPricing)> {
    let contents = std::fs::read_to_string(path)?;
    let file: PricingFile = serde_yaml::from_str(&contents)?;

    let provider = if file.provider.is_empty() {
        path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
    } else {
        file.provider.clone()
    };

    let models = file.models.into_iter().map(|(name, raw)| (name, raw.into())).collect();

    Ok((
        provider,
        ProviderPricing {
            currency: file.currency,
            unit: file.unit,
            models,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(models: &[(&str, RawModelPricing)]) -> Catalog {
        let mut map = Catalog::new();

        map.insert(
            "openai".to_string(),
            ProviderPricing {
                currency: "USD".to_string(),
                unit: "per_1m_tokens".to_string(),
                models: models
                    .iter()
                    .map(|(name, raw)| (name.to_string(), ModelPricing::from(raw.clone())))
                    .collect(),
            },
        );

        map
    }

    #[tokio::test]
    async fn calculates_cost_with_cache_read_bucket() {
        let catalog = catalog_with(&[(
            "gpt-4o",
            RawModelPricing {
                input: 2.5,
                output: 10.0,
                cache_write: None,
                cache_read: Some(1.25),
                cache_write_5m: None,
                cache_write_1h: None,
            },
        )]);

        let pricing = PricingCatalog::new(PathBuf::from("/nonexistent"));
        pricing.cache.preload(catalog).await;

        let cost = pricing
            .calculate_cost("openai", "gpt-4o", 1_000_000, 500_000, 0, 200_000)
            .await
            .expect("pricing should resolve");

        assert_eq!(cost.input_cost, 2.5);
        assert_eq!(cost.cache_read_cost, 0.25);
        assert_eq!(cost.cache_write_cost, 0.0);
        assert_eq!(cost.output_cost, 5.0);
        assert_eq!(cost.total_cost, 7.75);
    }

    #[test]
    fn prefers_five_minute_cache_write_over_one_hour() {
        let raw = RawModelPricing {
            input: 3.0,
            output: 15.0,
            cache_write: None,
            cache_read: None,
            cache_write_5m: Some(3.75),
            cache_write_1h: Some(6.0),
        };

        let pricing: ModelPricing = raw.into();

        assert_eq!(pricing.cache_write, Some(3.75));
    }

    #[test]
    fn normalizes_provider_prefixed_model_names() {
        assert_eq!(normalize_model_name("anthropic/claude-3-5-sonnet-20241022"), "claude-3-5-sonnet-20241022");
        assert_eq!(normalize_model_name("gpt-4o"), "gpt-4o");
    }

    #[tokio::test]
    async fn picks_the_cheapest_configured_provider() {
        let mut catalog = Catalog::new();

        catalog.insert(
            "openai".to_string(),
            ProviderPricing {
                currency: "USD".to_string(),
                unit: "per_1m_tokens".to_string(),
                models: HashMap::from([(
                    "gpt-4o".to_string(),
                    ModelPricing {
                        input: 2.5,
                        output: 10.0,
                        cache_write: None,
                        cache_read: None,
                    },
                )]),
            },
        );
        catalog.insert(
            "openrouter".to_string(),
            ProviderPricing {
                currency: "USD".to_string(),
                unit: "per_1m_tokens".to_string(),
                models: HashMap::from([(
                    "gpt-4o".to_string(),
                    ModelPricing {
                        input: 2.6,
                        output: 10.4,
                        cache_write: None,
                        cache_read: None,
                    },
                )]),
            },
        );

        let pricing = PricingCatalog::new(PathBuf::from("/nonexistent"));
        pricing.cache.preload(catalog).await;

        let cheapest = pricing
            .cheapest_provider("gpt-4o", ["openai", "openrouter"].into_iter())
            .await;

        assert_eq!(cheapest.as_deref(), Some("openai"));
    }
}
