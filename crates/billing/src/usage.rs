//! Usage metering
//!
//! Tracks consumed-vs-allowed call volume per account. Increments are single
//! atomic UPDATE statements, never read-modify-write from handler code, so
//! concurrent deliveries cannot lose updates. The quota is a soft cap:
//! `calls_used` may exceed `calls_limit` and is never decremented except by an
//! explicit plan reset.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use switchboard_shared::Plan;

use crate::error::BillingResult;

/// Quota state exposed to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub plan: String,
    pub status: String,
    pub calls_used: i32,
    pub calls_limit: i32,
    pub usage_percent: u8,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
}

/// Usage as a percentage of quota, clamped to 100. A zero or negative limit
/// reads as 0% rather than dividing by zero.
pub fn usage_percent(calls_used: i32, calls_limit: i32) -> u8 {
    if calls_limit <= 0 {
        return 0;
    }
    let percent = (f64::from(calls_used) / f64::from(calls_limit) * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

#[derive(Clone)]
pub struct UsageMeter {
    pool: PgPool,
}

impl UsageMeter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically consume one call from the account's quota.
    ///
    /// Takes an executor so the call-record pipeline can run the increment in
    /// the same transaction as the Call insert. Returns the number of rows
    /// updated: zero means the account has no subscription record yet (the
    /// call itself is still stored; usage for pre-onboarding accounts is not
    /// metered, matching the lazy subscription creation).
    pub async fn increment_calls_used<'e, E>(executor: E, account_id: Uuid) -> BillingResult<u64>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET calls_used = calls_used + 1, updated_at = NOW()
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(%account_id, "Usage increment matched no subscription record");
        }

        Ok(result.rows_affected())
    }

    /// Current quota state for an account, with free-tier defaults when no
    /// subscription record exists yet.
    pub async fn summary(&self, account_id: Uuid) -> BillingResult<UsageSummary> {
        let row: Option<(String, String, i32, i32, Option<OffsetDateTime>)> = sqlx::query_as(
            r#"
            SELECT plan, status, calls_used, calls_limit, current_period_end
            FROM subscriptions
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        let summary = match row {
            Some((plan, status, calls_used, calls_limit, current_period_end)) => UsageSummary {
                usage_percent: usage_percent(calls_used, calls_limit),
                plan,
                status,
                calls_used,
                calls_limit,
                current_period_end,
            },
            None => UsageSummary {
                plan: Plan::Free.as_str().to_string(),
                status: "trialing".to_string(),
                calls_used: 0,
                calls_limit: Plan::Free.calls_limit(),
                usage_percent: 0,
                current_period_end: None,
            },
        };

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(usage_percent(0, 100), 0);
        assert_eq!(usage_percent(33, 100), 33);
        assert_eq!(usage_percent(1, 3), 33);
        assert_eq!(usage_percent(2, 3), 67);
        assert_eq!(usage_percent(100, 100), 100);
        // Soft cap: usage past the limit still reads 100%
        assert_eq!(usage_percent(250, 100), 100);
    }

    #[test]
    fn zero_limit_reads_zero_percent() {
        assert_eq!(usage_percent(5, 0), 0);
        assert_eq!(usage_percent(5, -1), 0);
    }
}
