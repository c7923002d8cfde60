//! Subscription state machine
//!
//! The only writer of a subscription's plan and status, driven by verified
//! billing lifecycle events (plus the initial free-tier bootstrap used by
//! onboarding and checkout initiation). Each transition is a single upsert or
//! conditional update keyed on an external reference, so webhook redelivery
//! and concurrent handlers cannot produce lost updates.
//!
//! Ordering: each event payload is authoritative for the fields it carries,
//! and the provider event timestamp is recorded in `last_event_at`. Status
//! updates whose event timestamp is older than the last applied one are
//! discarded as stale. `subscription.deleted` is terminal and applies
//! unconditionally.

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use switchboard_shared::Plan;

use crate::error::BillingResult;
use crate::events::{CheckoutCompleted, PaymentFailed, SubscriptionDeleted, SubscriptionUpdated};

/// Renewal window applied when a checkout completes. Subsequent
/// `subscription.updated` events carry the provider's authoritative period end.
const RENEWAL_WINDOW: Duration = Duration::days(30);

/// A subscription row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub billing_customer_id: String,
    pub billing_subscription_id: Option<String>,
    pub plan: String,
    pub status: String,
    pub calls_used: i32,
    pub calls_limit: i32,
    pub current_period_end: Option<OffsetDateTime>,
}

/// Owns all plan/status transitions.
#[derive(Clone)]
pub struct SubscriptionService {
    pool: PgPool,
}

impl SubscriptionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// *checkout completed* — upsert to `active` with the purchased plan's
    /// quota, record the provider references, and extend the period end by the
    /// renewal window. Creates the subscription record if none exists yet.
    /// `calls_used` is preserved on update and starts at zero on create.
    pub async fn apply_checkout_completed(
        &self,
        session: &CheckoutCompleted,
        plan: Plan,
        event_at: OffsetDateTime,
    ) -> BillingResult<()> {
        let period_end = OffsetDateTime::now_utc() + RENEWAL_WINDOW;

        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                account_id, billing_customer_id, billing_subscription_id,
                plan, status, calls_used, calls_limit, current_period_end, last_event_at
            ) VALUES ($1, $2, $3, $4, 'active', 0, $5, $6, $7)
            ON CONFLICT (account_id) DO UPDATE SET
                billing_customer_id = EXCLUDED.billing_customer_id,
                billing_subscription_id = EXCLUDED.billing_subscription_id,
                plan = EXCLUDED.plan,
                status = 'active',
                calls_limit = EXCLUDED.calls_limit,
                current_period_end = EXCLUDED.current_period_end,
                last_event_at = EXCLUDED.last_event_at,
                updated_at = NOW()
            "#,
        )
        .bind(session.metadata.account_id)
        .bind(&session.customer)
        .bind(&session.subscription)
        .bind(plan.as_str())
        .bind(plan.calls_limit())
        .bind(period_end)
        .bind(event_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            account_id = %session.metadata.account_id,
            billing_subscription_id = %session.subscription,
            plan = %plan,
            "Checkout completed, subscription active"
        );

        Ok(())
    }

    /// *subscription updated* — copy the provider's reported status verbatim
    /// and refresh the period end. Matched by billing-subscription reference;
    /// events older than the last applied one are discarded.
    pub async fn apply_subscription_updated(
        &self,
        update: &SubscriptionUpdated,
        event_at: OffsetDateTime,
    ) -> BillingResult<()> {
        let period_end = OffsetDateTime::from_unix_timestamp(update.current_period_end)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2, current_period_end = $3, last_event_at = $4, updated_at = NOW()
            WHERE billing_subscription_id = $1
              AND (last_event_at IS NULL OR last_event_at <= $4)
            "#,
        )
        .bind(&update.id)
        .bind(&update.status)
        .bind(period_end)
        .bind(event_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.log_unapplied("subscription.updated", &update.id).await;
        } else {
            tracing::info!(
                billing_subscription_id = %update.id,
                status = %update.status,
                "Subscription updated"
            );
        }

        Ok(())
    }

    /// *subscription deleted* — force `canceled`, reset to the free plan and
    /// quota. `calls_used` is intentionally left untouched: cancellation does
    /// not erase usage history. Terminal, so no staleness check.
    pub async fn apply_subscription_deleted(
        &self,
        deleted: &SubscriptionDeleted,
        event_at: OffsetDateTime,
    ) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', plan = 'free', calls_limit = $2,
                last_event_at = $3, updated_at = NOW()
            WHERE billing_subscription_id = $1
            "#,
        )
        .bind(&deleted.id)
        .bind(Plan::Free.calls_limit())
        .bind(event_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.log_unapplied("subscription.deleted", &deleted.id)
                .await;
        } else {
            tracing::info!(
                billing_subscription_id = %deleted.id,
                "Subscription canceled, downgraded to free tier"
            );
        }

        Ok(())
    }

    /// *payment failed* — force `past_due`, leaving plan and quota untouched.
    /// A failed payment does not yet forfeit the purchased tier.
    pub async fn apply_payment_failed(
        &self,
        failure: &PaymentFailed,
        event_at: OffsetDateTime,
    ) -> BillingResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'past_due', last_event_at = $2, updated_at = NOW()
            WHERE billing_customer_id = $1
              AND (last_event_at IS NULL OR last_event_at <= $2)
            "#,
        )
        .bind(&failure.customer)
        .bind(event_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.log_unapplied("payment.failed", &failure.customer).await;
        } else {
            tracing::warn!(
                billing_customer_id = %failure.customer,
                "Payment failed, subscription past due"
            );
        }

        Ok(())
    }

    /// Free-tier bootstrap used by onboarding. A placeholder customer id is
    /// stored until checkout creates the real one. No-op if a record exists.
    pub async fn ensure_free_subscription(&self, account_id: Uuid) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (account_id, billing_customer_id, plan, status, calls_used, calls_limit)
            VALUES ($1, $2, 'free', 'trialing', 0, $3)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(format!("pending_{account_id}"))
        .bind(Plan::Free.calls_limit())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the real billing customer id once checkout initiation creates it.
    pub async fn set_billing_customer(
        &self,
        account_id: Uuid,
        customer_id: &str,
    ) -> BillingResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET billing_customer_id = $2, updated_at = NOW() WHERE account_id = $1",
        )
        .bind(account_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_subscription(
        &self,
        account_id: Uuid,
    ) -> BillingResult<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT id, account_id, billing_customer_id, billing_subscription_id,
                   plan, status, calls_used, calls_limit, current_period_end
            FROM subscriptions
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Distinguish "no matching row" from "stale event discarded" for the log.
    /// Neither case fails the handler: an unknown reference usually means the
    /// checkout event has not arrived yet, and a stale event has been
    /// superseded by a newer one.
    async fn log_unapplied(&self, event_type: &str, reference: &str) {
        let exists: Result<Option<(Uuid,)>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id FROM subscriptions
            WHERE billing_subscription_id = $1 OR billing_customer_id = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await;

        match exists {
            Ok(Some(_)) => tracing::info!(
                event_type,
                reference,
                "Stale billing event discarded (older than last applied)"
            ),
            Ok(None) => tracing::warn!(
                event_type,
                reference,
                "Billing event matched no subscription record"
            ),
            Err(e) => tracing::warn!(
                event_type,
                reference,
                error = %e,
                "Billing event applied to no rows; existence check failed"
            ),
        }
    }
}
