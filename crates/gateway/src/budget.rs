//! Budget Enforcer (C9).
//!
//! A single scoped spend limit, checked before every dispatch. The monthly
//! window is the current UTC calendar month; a `null` amount means
//! unlimited.

use jiff::Timestamp;
use rusqlite::{OptionalExtension, params};

use crate::{error::LlmError, store::Store, time::month_start_utc, usage::UsageStore};

const SCOPE: &str = "default";
const WINDOW: &str = "monthly";

#[derive(Debug, Clone)]
pub struct SpendLimit {
    pub amount_usd: Option<f64>,
    pub alert_only: bool,
}

impl Default for SpendLimit {
    fn default() -> Self {
        Self {
            amount_usd: None,
            alert_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BudgetStatus {
    pub limit: Option<f64>,
    pub alert_only: bool,
    pub spent: f64,
    pub remaining: Option<f64>,
    pub window: &'static str,
    pub allowed: bool,
}

pub(crate) struct BudgetEnforcer {
    store: Store,
    usage: UsageStore,
}

impl BudgetEnforcer {
    pub(crate) fn new(store: Store, usage: UsageStore) -> Self {
        Self { store, usage }
    }

    /// Reads the currently configured spend limit, defaulting to unlimited
    /// alert-only-off when none has ever been set.
    pub(crate) async fn get_limit(&self) -> anyhow::Result<SpendLimit> {
        self.store
            .run(|conn| {
                conn.query_row(
                    "SELECT amount_usd, alert_only FROM spend_limits WHERE id = 1",
                    [],
                    |row| {
                        Ok(SpendLimit {
                            amount_usd: row.get(0)?,
                            alert_only: row.get::<_, i64>(1)? != 0,
                        })
                    },
                )
                .optional()
                .map(Option::unwrap_or_default)
            })
            .await
    }

    /// Sets the spend limit. `amount_usd = None` means unlimited.
    pub(crate) async fn set_limit(&self, amount_usd: Option<f64>, alert_only: bool) -> anyhow::Result<()> {
        let updated_at = Timestamp::now().to_string();

        self.store
            .run(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO spend_limits (id, scope, amount_usd, alert_only, window, updated_at)
                    VALUES (1, ?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(id) DO UPDATE SET
                        amount_usd = excluded.amount_usd,
                        alert_only = excluded.alert_only,
                        updated_at = excluded.updated_at
                    "#,
                    params![SCOPE, amount_usd, alert_only as i64, WINDOW, updated_at],
                )?;

                Ok(())
            })
            .await
    }

    /// The current budget status for an additional `estimated_cost`, scoped
    /// to the current UTC calendar month.
    pub(crate) async fn get_budget_status(&self, estimated_cost: f64) -> anyhow::Result<BudgetStatus> {
        let limit = self.get_limit().await?;
        let now = Timestamp::now();
        let spent = self.usage.summary(month_start_utc(now), now).await?.total_cost;

        let estimated = estimated_cost.max(0.0);
        let allowed = limit.amount_usd.is_none_or(|amount| spent + estimated <= amount);
        let remaining = limit.amount_usd.map(|amount| (amount - spent).max(0.0));

        Ok(BudgetStatus {
            limit: limit.amount_usd,
            alert_only: limit.alert_only,
            spent,
            remaining,
            window: WINDOW,
            allowed,
        })
    }

    /// Pre-dispatch gate: returns `Err(LlmError::BudgetExceeded)` when the
    /// limit would be breached and alert-only mode is off; otherwise logs a
    /// warning in alert-only mode and lets the request proceed.
    pub(crate) async fn enforce_budget(&self, estimated_cost: f64) -> crate::Result<()> {
        let status = self
            .get_budget_status(estimated_cost)
            .await
            .map_err(|e| LlmError::InternalError(Some(e.to_string())))?;

        if status.allowed {
            return Ok(());
        }

        if status.alert_only {
            log::warn!(
                "monthly spend limit exceeded (spent={:.2}, limit={:.2?}) but alert_only is set; proceeding",
                status.spent,
                status.limit
            );

            return Ok(());
        }

        Err(LlmError::BudgetExceeded {
            spent: status.spent,
            limit: status.limit.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforcer() -> BudgetEnforcer {
        let store = Store::open_in_memory().unwrap();
        let usage = UsageStore::new(store.clone());
        BudgetEnforcer::new(store, usage)
    }

    #[tokio::test]
    async fn unlimited_by_default() {
        let enforcer = enforcer();
        let status = enforcer.get_budget_status(100.0).await.unwrap();

        assert!(status.allowed);
        assert_eq!(status.limit, None);
    }

    #[tokio::test]
    async fn blocks_when_limit_would_be_exceeded() {
        let enforcer = enforcer();
        enforcer.set_limit(Some(10.0), false).await.unwrap();

        enforcer
            .usage
            .record(crate::usage::UsageRecord::new(
                "openai".into(),
                "gpt-4o".into(),
                0,
                0,
                0,
                0,
                Some(crate::pricing::CostBreakdown {
                    input_cost: 9.5,
                    cache_write_cost: 0.0,
                    cache_read_cost: 0.0,
                    output_cost: 0.0,
                    total_cost: 9.5,
                    currency: "USD".into(),
                    unit: "per_1m_tokens".into(),
                }),
            ))
            .await
            .unwrap();

        let error = enforcer.enforce_budget(1.0).await.expect_err("budget should be exceeded");
        assert_eq!(error.status_code(), axum::http::StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn alert_only_logs_but_proceeds() {
        let enforcer = enforcer();
        enforcer.set_limit(Some(10.0), true).await.unwrap();

        enforcer
            .usage
            .record(crate::usage::UsageRecord::new(
                "openai".into(),
                "gpt-4o".into(),
                0,
                0,
                0,
                0,
                Some(crate::pricing::CostBreakdown {
                    input_cost: 9.5,
                    cache_write_cost: 0.0,
                    cache_read_cost: 0.0,
                    output_cost: 0.0,
                    total_cost: 9.5,
                    currency: "USD".into(),
                    unit: "per_1m_tokens".into(),
                }),
            ))
            .await
            .unwrap();

        enforcer.enforce_budget(1.0).await.expect("alert_only should not block");
    }
}
