//! Usage Accounting (C8).
//!
//! Persists one append-only record per completed request and answers the
//! aggregation queries the `/usage` endpoint and the budget enforcer (§4.8)
//! need, all scoped to an explicit `[start, end)` timestamp range.

use jiff::Timestamp;
use rusqlite::params;
use uuid::Uuid;

use crate::{pricing::CostBreakdown, store::Store};

const DEFAULT_PAGE_SIZE: usize = 100;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub request_id: String,
    pub provider: String,
    pub model: String,
    pub timestamp: Timestamp,
    pub input_tokens: u64,
    pub cache_write_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub cache_write_cost: f64,
    pub cache_read_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub currency: String,
    pub payment_method: String,
}

impl UsageRecord {
    /// Builds a new record with a fresh request id, either from a resolved
    /// [`CostBreakdown`] or, when pricing is unavailable, as a zero-cost
    /// record with a warning already logged by the caller.
    pub(crate) fn new(
        provider: String,
        model: String,
        input_tokens: u64,
        cache_write_input_tokens: u64,
        cache_read_input_tokens: u64,
        output_tokens: u64,
        cost: Option<CostBreakdown>,
    ) -> Self {
        let cost = cost.unwrap_or(CostBreakdown {
            input_cost: 0.0,
            cache_write_cost: 0.0,
            cache_read_cost: 0.0,
            output_cost: 0.0,
            total_cost: 0.0,
            currency: "USD".to_string(),
            unit: "per_1m_tokens".to_string(),
        });

        Self {
            request_id: Uuid::new_v4().to_string(),
            provider,
            model,
            timestamp: Timestamp::now(),
            input_tokens,
            cache_write_input_tokens,
            cache_read_input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            input_cost: cost.input_cost,
            cache_write_cost: cost.cache_write_cost,
            cache_read_cost: cost.cache_read_cost,
            output_cost: cost.output_cost,
            total_cost: cost.total_cost,
            currency: cost.currency,
            payment_method: "pay_as_you_go".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UsageSummary {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_requests: u64,
}

#[derive(Debug, Clone)]
pub struct UsagePage {
    pub total: usize,
    pub records: Vec<UsageRecord>,
}

#[derive(Debug, Clone)]
pub struct HourlyBucket {
    pub hour_start: Timestamp,
    pub total_cost: f64,
    pub total_tokens: u64,
}

pub(crate) struct UsageStore {
    store: Store,
}

impl UsageStore {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Persists `record`. Called once per successful non-streaming response,
    /// or at the terminal `complete` event of a streaming one.
    pub(crate) async fn record(&self, record: UsageRecord) -> anyhow::Result<()> {
        let created_at = Timestamp::now().to_string();

        self.store
            .run(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO usage_records (
                        request_id, provider, model, timestamp,
                        input_tokens, cache_write_input_tokens, cache_read_input_tokens, output_tokens, total_tokens,
                        input_cost, cache_write_cost, cache_read_cost, output_cost, total_cost,
                        currency, payment_method, created_at
                    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)
                    "#,
                    params![
                        record.request_id,
                        record.provider,
                        record.model,
                        record.timestamp.to_string(),
                        record.input_tokens as i64,
                        record.cache_write_input_tokens as i64,
                        record.cache_read_input_tokens as i64,
                        record.output_tokens as i64,
                        record.total_tokens as i64,
                        record.input_cost,
                        record.cache_write_cost,
                        record.cache_read_cost,
                        record.output_cost,
                        record.total_cost,
                        record.currency,
                        record.payment_method,
                        created_at,
                    ],
                )?;

                Ok(())
            })
            .await
    }

    /// Total cost, tokens, and request count in `[start, end)`.
    pub(crate) async fn summary(&self, start: Timestamp, end: Timestamp) -> anyhow::Result<UsageSummary> {
        let (start, end) = (start.to_string(), end.to_string());

        self.store
            .run(move |conn| {
                conn.query_row(
                    r#"
                    SELECT COALESCE(SUM(total_cost), 0.0), COALESCE(SUM(total_tokens), 0), COUNT(*)
                    FROM usage_records WHERE timestamp >= ?1 AND timestamp < ?2
                    "#,
                    params![start, end],
                    |row| {
                        Ok(UsageSummary {
                            total_cost: row.get(0)?,
                            total_tokens: row.get::<_, i64>(1)? as u64,
                            total_requests: row.get::<_, i64>(2)? as u64,
                        })
                    },
                )
                .map_err(Into::into)
            })
            .await
    }

    /// Cost grouped by provider in `[start, end)`.
    pub(crate) async fn cost_by_provider(&self, start: Timestamp, end: Timestamp) -> anyhow::Result<Vec<(String, f64)>> {
        let (start, end) = (start.to_string(), end.to_string());

        self.store
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT provider, SUM(total_cost) FROM usage_records
                    WHERE timestamp >= ?1 AND timestamp < ?2
                    GROUP BY provider ORDER BY provider
                    "#,
                )?;

                let rows = stmt
                    .query_map(params![start, end], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(rows)
            })
            .await
    }

    /// Cost grouped by model in `[start, end)`.
    pub(crate) async fn cost_by_model(&self, start: Timestamp, end: Timestamp) -> anyhow::Result<Vec<(String, f64)>> {
        let (start, end) = (start.to_string(), end.to_string());

        self.store
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT model, SUM(total_cost) FROM usage_records
                    WHERE timestamp >= ?1 AND timestamp < ?2
                    GROUP BY model ORDER BY model
                    "#,
                )?;

                let rows = stmt
                    .query_map(params![start, end], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(rows)
            })
            .await
    }

    /// Hourly cost/token breakdown for the 24 hours ending at `now`.
    pub(crate) async fn hourly_breakdown(&self, now: Timestamp) -> anyhow::Result<Vec<HourlyBucket>> {
        let start = crate::time::one_day_before(now);
        let (start_str, now_str) = (start.to_string(), now.to_string());

        self.store
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT substr(timestamp, 1, 13) AS hour, SUM(total_cost), SUM(total_tokens)
                    FROM usage_records
                    WHERE timestamp >= ?1 AND timestamp < ?2
                    GROUP BY hour ORDER BY hour
                    "#,
                )?;

                let rows = stmt
                    .query_map(params![start_str, now_str], |row| {
                        let hour: String = row.get(0)?;
                        let total_cost: f64 = row.get(1)?;
                        let total_tokens: i64 = row.get(2)?;
                        Ok((hour, total_cost, total_tokens as u64))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(rows
                    .into_iter()
                    .filter_map(|(hour, total_cost, total_tokens)| {
                        let parsed: Timestamp = format!("{hour}:00:00Z").parse().ok()?;
                        Some(HourlyBucket {
                            hour_start: parsed,
                            total_cost,
                            total_tokens,
                        })
                    })
                    .collect())
            })
            .await
    }

    /// Paginated record listing, most recent first.
    pub(crate) async fn list(&self, start: Timestamp, end: Timestamp, limit: usize, offset: usize) -> anyhow::Result<UsagePage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let (start_s, end_s) = (start.to_string(), end.to_string());

        self.store
            .run(move |conn| {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM usage_records WHERE timestamp >= ?1 AND timestamp < ?2",
                    params![start_s, end_s],
                    |row| row.get(0),
                )?;

                let mut stmt = conn.prepare(
                    r#"
                    SELECT request_id, provider, model, timestamp,
                           input_tokens, cache_write_input_tokens, cache_read_input_tokens, output_tokens, total_tokens,
                           input_cost, cache_write_cost, cache_read_cost, output_cost, total_cost,
                           currency, payment_method
                    FROM usage_records
                    WHERE timestamp >= ?1 AND timestamp < ?2
                    ORDER BY timestamp DESC
                    LIMIT ?3 OFFSET ?4
                    "#,
                )?;

                let records = stmt
                    .query_map(params![start_s, end_s, limit as i64, offset as i64], |row| {
                        Ok(UsageRecord {
                            request_id: row.get(0)?,
                            provider: row.get(1)?,
                            model: row.get(2)?,
                            timestamp: row.get::<_, String>(3)?.parse().unwrap_or_else(|_| Timestamp::now()),
                            input_tokens: row.get::<_, i64>(4)? as u64,
                            cache_write_input_tokens: row.get::<_, i64>(5)? as u64,
                            cache_read_input_tokens: row.get::<_, i64>(6)? as u64,
                            output_tokens: row.get::<_, i64>(7)? as u64,
                            total_tokens: row.get::<_, i64>(8)? as u64,
                            input_cost: row.get(9)?,
                            cache_write_cost: row.get(10)?,
                            cache_read_cost: row.get(11)?,
                            output_cost: row.get(12)?,
                            total_cost: row.get(13)?,
                            currency: row.get(14)?,
                            payment_method: row.get(15)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;

                Ok(UsagePage {
                    total: total as usize,
                    records,
                })
            })
            .await
    }
}

/// Clamps a requested page size to `[1, MAX_PAGE_SIZE]`, defaulting to
/// [`DEFAULT_PAGE_SIZE`] when unset.
pub fn normalize_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::CostBreakdown;

    fn sample_record(total_cost: f64) -> UsageRecord {
        UsageRecord::new(
            "openai".to_string(),
            "gpt-4o".to_string(),
            1000,
            0,
            0,
            500,
            Some(CostBreakdown {
                input_cost: total_cost / 2.0,
                cache_write_cost: 0.0,
                cache_read_cost: 0.0,
                output_cost: total_cost / 2.0,
                total_cost,
                currency: "USD".to_string(),
                unit: "per_1m_tokens".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn records_persist_and_aggregate() {
        let store = crate::store::Store::open_in_memory().unwrap();
        let usage = UsageStore::new(store);

        usage.record(sample_record(1.5)).await.unwrap();
        usage.record(sample_record(2.5)).await.unwrap();

        let start = Timestamp::from_second(Timestamp::now().as_second() - 3600).unwrap();
        let end = Timestamp::from_second(Timestamp::now().as_second() + 3600).unwrap();

        let summary = usage.summary(start, end).await.unwrap();

        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.total_cost, 4.0);
        assert_eq!(summary.total_tokens, 3000);
    }

    #[tokio::test]
    async fn zero_cost_record_persists_when_pricing_is_unknown() {
        let store = crate::store::Store::open_in_memory().unwrap();
        let usage = UsageStore::new(store);

        let record = UsageRecord::new("openai".to_string(), "mystery-model".to_string(), 100, 0, 0, 50, None);
        assert_eq!(record.total_cost, 0.0);

        usage.record(record).await.unwrap();

        let start = Timestamp::from_second(Timestamp::now().as_second() - 3600).unwrap();
        let end = Timestamp::from_second(Timestamp::now().as_second() + 3600).unwrap();
        let summary = usage.summary(start, end).await.unwrap();

        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.total_cost, 0.0);
    }
}
