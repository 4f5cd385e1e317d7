use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    body::Bytes,
    extract::{Extension, Json, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Sse, sse::Event},
    routing::{get, post},
};
use futures::StreamExt;
use jiff::Timestamp;
use messages::{anthropic, format::Format, openai, responses};
use serde::Serialize;

mod auth;
mod budget;
mod cache;
mod catalog;
mod error;
mod http_client;
mod messages;
mod pricing;
pub mod provider;
mod request;
mod server;
mod store;
mod time;
pub mod token_counter;
mod usage;

pub use error::{AnthropicResult, LlmError, LlmResult as Result};
use serde::Deserialize;
use server::{LlmHandler, LlmServerBuilder};

use crate::messages::unified;

/// Creates an axum router for LLM endpoints.
pub async fn router(config: &config::Config) -> anyhow::Result<Router> {
    let server = Arc::new(
        LlmServerBuilder::new(config)
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize LLM server: {e}"))?,
    );

    let mut router = Router::new()
        .route("/v1/models", get(list_models))
        .route("/usage", get(get_usage))
        .route("/budget", get(get_budget).put(put_budget))
        .with_state(server.clone());

    if config.llm.protocols.openai.enabled {
        let openai_routes = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(server.clone());

        router = merge_at(router, &config.llm.protocols.openai.path, openai_routes);
    }

    if config.llm.protocols.anthropic.enabled {
        let anthropic_routes = Router::new()
            .route("/v1/messages", post(anthropic_messages))
            .with_state(server.clone());

        router = merge_at(router, &config.llm.protocols.anthropic.path, anthropic_routes);
    }

    if config.llm.protocols.responses.enabled {
        let responses_routes = Router::new()
            .route("/v1/responses", post(responses_endpoint))
            .with_state(server.clone());

        router = merge_at(router, &config.llm.protocols.responses.path, responses_routes);
    }

    Ok(router)
}

/// Mounts `routes` at `path`, or merges them directly when `path` is empty.
///
/// `Router::nest` panics on an empty path, but an empty `protocols.*.path` is
/// the default (dialect routes live at their literal top-level paths).
fn merge_at(router: Router, path: &str, routes: Router) -> Router {
    if path.is_empty() {
        router.merge(routes)
    } else {
        router.nest(path, routes)
    }
}

/// Handle chat completion requests.
///
/// This endpoint supports both streaming and non-streaming responses.
/// When `stream: true` is set in the request, the response is sent as
/// Server-Sent Events (SSE). Otherwise, a standard JSON response is returned.
async fn chat_completions(
    State(server): State<Arc<LlmHandler>>,
    headers: HeaderMap,
    client_identity: Option<Extension<context::ClientIdentity>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let unified_request = server.format_registry().client_to_canonical(Format::OpenAiChat, &body)?;

    log::debug!("OpenAI chat completions handler called for model: {}", unified_request.model);
    log::debug!("Request has {} messages", unified_request.messages.len());
    log::debug!("Streaming: {}", unified_request.stream.unwrap_or(false));

    // Extract request context including client identity
    let context = request::extract_context(&headers, client_identity.map(|ext| ext.0));

    // Check if streaming is requested
    if unified_request.stream.unwrap_or(false) {
        let stream = server.completions_stream(unified_request, &context).await?;

        let event_stream = stream.map(move |result| {
            let event = match result {
                Ok(unified_chunk) => {
                    // Convert UnifiedChunk to OpenAI format for OpenAI protocol
                    let openai_chunk = openai::ChatCompletionChunk::from(unified_chunk);
                    let json = sonic_rs::to_string(&openai_chunk).unwrap_or_else(|e| {
                        log::error!("Failed to serialize chunk: {e}");
                        r#"{"error":"serialization failed"}"#.to_string()
                    });

                    Event::default().data(json)
                }
                Err(e) => {
                    log::error!("Stream error: {e}");
                    Event::default().data(format!(r#"{{"error":"{e}"}}"#))
                }
            };

            Ok::<_, Infallible>(event)
        });

        let with_done = event_stream.chain(futures::stream::once(async {
            Ok::<_, Infallible>(Event::default().data("[DONE]"))
        }));

        log::debug!("Returning streaming response");
        Ok(Sse::new(with_done).into_response())
    } else {
        let unified_response = server.completions(unified_request, &context).await?;
        let bytes = server
            .format_registry()
            .canonical_to_client(Format::OpenAiChat, unified_response)?;

        log::debug!("Chat completion successful, returning {} bytes", bytes.len());

        Ok(json_bytes_response(bytes).into_response())
    }
}

/// Wraps serialized wire bytes from an `AdapterRegistry` adapter in a JSON response.
fn json_bytes_response(bytes: Vec<u8>) -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], bytes)
}

/// Handle list models requests.
async fn list_models(State(server): State<Arc<LlmHandler>>) -> Result<impl IntoResponse> {
    let response = server.models().await;

    log::debug!("Returning {} models", response.data.len());
    Ok(Json(response))
}

/// Handle Anthropic messages requests.
///
/// This endpoint supports both streaming and non-streaming responses.
/// When `stream: true` is set in the request, the response is sent as
/// Server-Sent Events (SSE). Otherwise, a standard JSON response is returned.
async fn anthropic_messages(
    State(server): State<Arc<LlmHandler>>,
    headers: HeaderMap,
    client_identity: Option<Extension<context::ClientIdentity>>,
    body: Bytes,
) -> AnthropicResult<impl IntoResponse> {
    let unified_request = server.format_registry().client_to_canonical(Format::Anthropic, &body)?;

    log::debug!("Anthropic messages handler called for model: {}", unified_request.model);
    log::debug!("Request has {} messages", unified_request.messages.len());
    log::debug!("Streaming: {}", unified_request.stream.unwrap_or(false));

    // Extract request context including client identity
    let context = request::extract_context(&headers, client_identity.map(|ext| ext.0));

    // Check if streaming is requested
    if unified_request.stream.unwrap_or(false) {
        let stream = server.completions_stream(unified_request, &context).await?;

        // Anthropic's SSE protocol wraps the per-chunk deltas in events that
        // don't correspond to any single chunk (message_start/
        // content_block_stop/message_stop), so each incoming chunk can
        // expand to several outgoing events. `AnthropicStreamState` carries
        // the bookkeeping (has message_start gone out yet, which tool
        // indices are still open) across the whole stream.
        let mut egress_state = unified::to_anthropic::AnthropicStreamState::new();

        let anthropic_events = stream.flat_map(move |result| {
            let events = match result {
                Ok(chunk) => egress_state.convert(chunk),
                Err(e) => {
                    log::error!("Stream error: {e}");
                    let anthropic_error = anthropic::AnthropicError::from(e);
                    vec![anthropic::AnthropicStreamEvent::Error {
                        error: anthropic_error.error,
                    }]
                }
            };

            futures::stream::iter(events)
        });

        let event_stream = anthropic_events.map(|anthropic_event| {
            let json = sonic_rs::to_string(&anthropic_event).unwrap_or_else(|e| {
                log::error!("Failed to serialize Anthropic streaming event: {e}");
                r#"{"error":"serialization failed"}"#.to_string()
            });

            Ok::<_, Infallible>(Event::default().data(json))
        });

        // Anthropic doesn't use [DONE] marker, just end the stream
        log::debug!("Returning Anthropic streaming response");

        Ok(Sse::new(event_stream).into_response())
    } else {
        let unified_response = server.completions(unified_request, &context).await?;
        let bytes = server
            .format_registry()
            .canonical_to_client(Format::Anthropic, unified_response)?;

        log::debug!("Anthropic messages completion successful");

        Ok(json_bytes_response(bytes).into_response())
    }
}

/// Handle OpenAI Responses requests (`/v1/responses`).
///
/// This endpoint supports both streaming and non-streaming responses, same as
/// the Chat Completions and Anthropic Messages endpoints. The Responses wire
/// format only shapes the request/response bodies; dispatch to a provider
/// still goes through the same unified request/response types.
async fn responses_endpoint(
    State(server): State<Arc<LlmHandler>>,
    headers: HeaderMap,
    client_identity: Option<Extension<context::ClientIdentity>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let unified_request = server
        .format_registry()
        .client_to_canonical(Format::OpenAiResponses, &body)?;

    log::debug!("Responses handler called for model: {}", unified_request.model);

    let context = request::extract_context(&headers, client_identity.map(|ext| ext.0));
    let stream_requested = unified_request.stream.unwrap_or(false);

    if stream_requested {
        let stream = server.completions_stream(unified_request, &context).await?;

        let event_stream = stream.map(move |result| {
            let event = match result {
                Ok(chunk) => {
                    let responses_event = responses::ResponsesStreamEvent::from(chunk);
                    let json = sonic_rs::to_string(&responses_event).unwrap_or_else(|e| {
                        log::error!("Failed to serialize Responses stream event: {e}");
                        r#"{"type":"error","message":"serialization failed"}"#.to_string()
                    });

                    Event::default().data(json)
                }
                Err(e) => {
                    log::error!("Stream error: {e}");
                    Event::default().data(format!(r#"{{"type":"response.failed","error":"{e}"}}"#))
                }
            };

            Ok::<_, Infallible>(event)
        });

        log::debug!("Returning Responses streaming response");
        Ok(Sse::new(event_stream).into_response())
    } else {
        let unified_response = server.completions(unified_request, &context).await?;
        let bytes = server
            .format_registry()
            .canonical_to_client(Format::OpenAiResponses, unified_response)?;

        log::debug!("Responses completion successful");
        Ok(json_bytes_response(bytes).into_response())
    }
}

/// Query parameters for `GET /usage`. `from`/`to` are ISO-8601 timestamps;
/// when omitted the window defaults to the last 30 days ending now.
#[derive(Debug, Deserialize)]
struct UsageQuery {
    from: Option<String>,
    to: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct UsageReport {
    total_cost: f64,
    total_tokens: u64,
    total_requests: u64,
    cost_by_provider: Vec<(String, f64)>,
    cost_by_model: Vec<(String, f64)>,
    hourly: Vec<HourlyBucketView>,
    records: Vec<UsageRecordView>,
    records_total: usize,
}

#[derive(Debug, Serialize)]
struct HourlyBucketView {
    hour_start: String,
    total_cost: f64,
    total_tokens: u64,
}

/// Wire shape for a single usage record; timestamps are rendered as
/// RFC 3339 strings rather than relying on `jiff`'s own serde impl.
#[derive(Debug, Serialize)]
struct UsageRecordView {
    request_id: String,
    provider: String,
    model: String,
    timestamp: String,
    input_tokens: u64,
    cache_write_input_tokens: u64,
    cache_read_input_tokens: u64,
    output_tokens: u64,
    total_tokens: u64,
    input_cost: f64,
    cache_write_cost: f64,
    cache_read_cost: f64,
    output_cost: f64,
    total_cost: f64,
    currency: String,
    payment_method: String,
}

impl From<crate::usage::UsageRecord> for UsageRecordView {
    fn from(record: crate::usage::UsageRecord) -> Self {
        Self {
            request_id: record.request_id,
            provider: record.provider,
            model: record.model,
            timestamp: record.timestamp.to_string(),
            input_tokens: record.input_tokens,
            cache_write_input_tokens: record.cache_write_input_tokens,
            cache_read_input_tokens: record.cache_read_input_tokens,
            output_tokens: record.output_tokens,
            total_tokens: record.total_tokens,
            input_cost: record.input_cost,
            cache_write_cost: record.cache_write_cost,
            cache_read_cost: record.cache_read_cost,
            output_cost: record.output_cost,
            total_cost: record.total_cost,
            currency: record.currency,
            payment_method: record.payment_method,
        }
    }
}

/// Parses an ISO-8601 timestamp from a query parameter, rejecting the
/// request with `400` on a malformed value rather than silently defaulting.
fn parse_query_timestamp(value: &Option<String>, field: &'static str) -> Result<Option<Timestamp>> {
    value
        .as_deref()
        .map(|raw| {
            raw.parse::<Timestamp>()
                .map_err(|_| LlmError::InvalidRequest(format!("invalid ISO-8601 timestamp for '{field}': {raw}")))
        })
        .transpose()
}

/// Handle aggregated usage queries (§6 `GET /usage`).
async fn get_usage(State(server): State<Arc<LlmHandler>>, Query(query): Query<UsageQuery>) -> Result<impl IntoResponse> {
    let now = Timestamp::now();
    let start = parse_query_timestamp(&query.from, "from")?.unwrap_or_else(|| crate::time::thirty_days_before(now));
    let end = parse_query_timestamp(&query.to, "to")?.unwrap_or(now);
    let limit = crate::usage::normalize_limit(query.limit);
    let offset = query.offset.unwrap_or(0);

    let summary = server
        .usage_summary(start, end)
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;
    let cost_by_provider = server
        .usage_cost_by_provider(start, end)
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;
    let cost_by_model = server
        .usage_cost_by_model(start, end)
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;
    let hourly = server
        .usage_hourly_breakdown(now)
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?
        .into_iter()
        .map(|bucket| HourlyBucketView {
            hour_start: bucket.hour_start.to_string(),
            total_cost: bucket.total_cost,
            total_tokens: bucket.total_tokens,
        })
        .collect();
    let page = server
        .usage_list(start, end, limit, offset)
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;

    Ok(Json(UsageReport {
        total_cost: summary.total_cost,
        total_tokens: summary.total_tokens,
        total_requests: summary.total_requests,
        cost_by_provider,
        cost_by_model,
        hourly,
        records_total: page.total,
        records: page.records.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct BudgetStatusResponse {
    limit: Option<f64>,
    alert_only: bool,
    spent: f64,
    remaining: Option<f64>,
    window: &'static str,
    allowed: bool,
}

impl From<crate::budget::BudgetStatus> for BudgetStatusResponse {
    fn from(status: crate::budget::BudgetStatus) -> Self {
        Self {
            limit: status.limit,
            alert_only: status.alert_only,
            spent: status.spent,
            remaining: status.remaining,
            window: status.window,
            allowed: status.allowed,
        }
    }
}

/// Handle `GET /budget` (§6).
async fn get_budget(State(server): State<Arc<LlmHandler>>) -> Result<impl IntoResponse> {
    let status = server
        .budget_status()
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;

    Ok(Json(BudgetStatusResponse::from(status)))
}

#[derive(Debug, Deserialize)]
struct SetBudgetRequest {
    amount_usd: Option<f64>,
    #[serde(default)]
    alert_only: bool,
}

/// Handle `PUT /budget` (§6).
async fn put_budget(State(server): State<Arc<LlmHandler>>, Json(body): Json<SetBudgetRequest>) -> Result<impl IntoResponse> {
    server
        .set_budget(body.amount_usd, body.alert_only)
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;

    let status = server
        .budget_status()
        .await
        .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;

    Ok((StatusCode::OK, Json(BudgetStatusResponse::from(status))))
}

