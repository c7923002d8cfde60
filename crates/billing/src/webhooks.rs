//! Billing webhook handling
//!
//! Verifies inbound provider events against the shared webhook secret and
//! applies them at most once despite at-least-once delivery.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use crate::client::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::events::{BillingEvent, EventPayload};
use crate::subscriptions::SubscriptionService;
use switchboard_shared::Plan;

type HmacSha256 = Hmac<Sha256>;

/// Signature timestamp tolerance (seconds).
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Events stuck in `processing` longer than this may be re-claimed, covering
/// handlers that died between claiming and recording a result.
const PROCESSING_TIMEOUT_MINUTES: i32 = 30;

/// Webhook handler for billing provider events.
pub struct WebhookHandler {
    config: BillingConfig,
    pool: PgPool,
    subscriptions: SubscriptionService,
}

impl WebhookHandler {
    pub fn new(config: BillingConfig, pool: PgPool) -> Self {
        let subscriptions = SubscriptionService::new(pool.clone());
        Self {
            config,
            pool,
            subscriptions,
        }
    }

    /// Verify a provider signature and parse the event.
    ///
    /// Operates on the exact byte sequence received — signatures are computed
    /// over raw bytes, so any prior JSON parse would be a correctness bug.
    /// The header format is `t=<unix>,v1=<hex hmac>`; the signed payload is
    /// `"{t}." + body`. A bad signature is a permanent rejection.
    pub fn verify_event(&self, payload: &[u8], signature: &str) -> BillingResult<BillingEvent> {
        self.verify_event_at(payload, signature, unix_now())
    }

    /// Clock-injectable variant of [`verify_event`](Self::verify_event).
    pub fn verify_event_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> BillingResult<BillingEvent> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<&str> = None;

        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => v1_signature = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            tracing::error!("Missing timestamp in signature header");
            BillingError::WebhookSignatureInvalid
        })?;

        let v1_signature = v1_signature.ok_or_else(|| {
            tracing::error!("Missing v1 signature in signature header");
            BillingError::WebhookSignatureInvalid
        })?;

        if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            tracing::error!(
                timestamp,
                now,
                diff = (now - timestamp).abs(),
                "Webhook timestamp outside tolerance"
            );
            return Err(BillingError::WebhookSignatureInvalid);
        }

        // The secret may carry a "whsec_" prefix as issued by the provider.
        let secret_key = self
            .config
            .webhook_secret
            .strip_prefix("whsec_")
            .unwrap_or(&self.config.webhook_secret);

        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).map_err(|_| {
            tracing::error!("Invalid webhook secret key");
            BillingError::WebhookSignatureInvalid
        })?;
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        let computed = hex::encode(mac.finalize().into_bytes());

        if computed != v1_signature {
            tracing::error!("Webhook signature mismatch");
            return Err(BillingError::WebhookSignatureInvalid);
        }

        let event: BillingEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::error!(parse_error = %e, "Failed to parse webhook event JSON");
            BillingError::WebhookSignatureInvalid
        })?;

        tracing::info!(
            event_id = %event.id,
            event_type = event.type_name(),
            "Webhook signature verified"
        );

        Ok(event)
    }

    /// Handle a verified event at most once.
    ///
    /// Uses INSERT...ON CONFLICT...RETURNING to atomically claim exclusive
    /// processing rights on the provider event id, so two concurrent
    /// deliveries of the same event cannot both pass an EXISTS check.
    /// Re-claimable rows: events whose previous attempt errored (the 5xx that
    /// attempt returned triggers this redelivery), and events stuck in
    /// `processing` past the timeout.
    pub async fn handle_event(&self, event: BillingEvent) -> BillingResult<()> {
        let event_timestamp = event.created_at();

        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO billing_webhook_events
                (provider_event_id, event_type, event_timestamp, processing_result, processing_started_at)
            VALUES ($1, $2, $3, 'processing', NOW())
            ON CONFLICT (provider_event_id) DO UPDATE SET
                processing_result = 'processing',
                processing_started_at = NOW(),
                error_message = NULL
            WHERE billing_webhook_events.processing_result = 'error'
               OR (billing_webhook_events.processing_result = 'processing'
                   AND billing_webhook_events.processing_started_at < NOW() - ($4 || ' minutes')::INTERVAL)
            RETURNING id
            "#,
        )
        .bind(&event.id)
        .bind(event.type_name())
        .bind(event_timestamp)
        .bind(PROCESSING_TIMEOUT_MINUTES)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(event_id = %event.id, error = %e, "Failed to claim webhook event");
            BillingError::Database(e)
        })?;

        if claimed.is_none() {
            let stored: Option<(String,)> = sqlx::query_as(
                "SELECT processing_result FROM billing_webhook_events WHERE provider_event_id = $1",
            )
            .bind(&event.id)
            .fetch_optional(&self.pool)
            .await?;

            return unclaimed_event_outcome(&event.id, stored.as_ref().map(|(r,)| r.as_str()));
        }

        tracing::info!(
            event_id = %event.id,
            event_type = event.type_name(),
            "Processing billing webhook event"
        );

        let result = self.process_event(&event).await;

        let (processing_result, error_message) = match &result {
            Ok(()) => ("success", None),
            Err(e) => ("error", Some(e.to_string())),
        };

        // A failed result is recorded but still surfaced to the caller as a
        // 500 so the provider redelivers; the claim above re-claims rows in
        // the 'error' state, so the redelivery reprocesses the event.
        if let Err(e) = sqlx::query(
            r#"
            UPDATE billing_webhook_events
            SET processing_result = $1, error_message = $2
            WHERE provider_event_id = $3
            "#,
        )
        .bind(processing_result)
        .bind(&error_message)
        .bind(&event.id)
        .execute(&self.pool)
        .await
        {
            tracing::error!(
                event_id = %event.id,
                processing_result,
                error = %e,
                "Failed to record webhook processing result; event may appear stuck"
            );
        }

        result
    }

    async fn process_event(&self, event: &BillingEvent) -> BillingResult<()> {
        let event_at = event.created_at();

        match &event.payload {
            EventPayload::CheckoutCompleted(session) => {
                let plan = Plan::from_str(&session.metadata.plan)
                    .ok_or_else(|| BillingError::InvalidPlan(session.metadata.plan.clone()))?;
                self.subscriptions
                    .apply_checkout_completed(session, plan, event_at)
                    .await
            }
            EventPayload::SubscriptionUpdated(update) => {
                self.subscriptions
                    .apply_subscription_updated(update, event_at)
                    .await
            }
            EventPayload::SubscriptionDeleted(deleted) => {
                self.subscriptions
                    .apply_subscription_deleted(deleted, event_at)
                    .await
            }
            EventPayload::PaymentFailed(failure) => {
                self.subscriptions
                    .apply_payment_failed(failure, event_at)
                    .await
            }
            EventPayload::Unhandled => {
                tracing::info!(
                    event_id = %event.id,
                    "Received unhandled billing event type - no handler configured"
                );
                Ok(())
            }
        }
    }
}

/// Response for a delivery that failed to claim its event.
///
/// `success` and fresh `processing` rows are acknowledged (the event was or is
/// being applied; for an in-flight row the active handler's own response
/// governs redelivery). Anything else means the claim raced — errored rows
/// are normally re-claimed directly — so the delivery is failed to keep the
/// provider redelivering rather than dropping the event.
fn unclaimed_event_outcome(event_id: &str, stored_result: Option<&str>) -> BillingResult<()> {
    match stored_result {
        Some("success") => {
            tracing::info!(event_id, "Duplicate webhook event, already applied");
            Ok(())
        }
        Some("processing") => {
            tracing::info!(event_id, "Webhook event already being processed");
            Ok(())
        }
        other => {
            tracing::warn!(event_id, stored_result = ?other, "Webhook event claim lost; failing for redelivery");
            Err(BillingError::Internal(format!(
                "event {event_id} not applied; awaiting redelivery"
            )))
        }
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BillingConfig;

    fn handler_with_secret(secret: &str) -> (WebhookHandler, sqlx::PgPool) {
        let config = BillingConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: secret.to_string(),
            price_starter: "price_s".to_string(),
            price_pro: "price_p".to_string(),
            checkout_success_url: String::new(),
            checkout_cancel_url: String::new(),
            portal_return_url: String::new(),
            api_base: String::new(),
        };
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused")
            .expect("lazy pool never connects in these tests");
        (WebhookHandler::new(config, pool.clone()), pool)
    }

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    const PAYLOAD: &[u8] = br#"{
        "id": "evt_100",
        "type": "payment.failed",
        "created": 1724800000,
        "data": { "customer": "cus_1" }
    }"#;

    #[tokio::test]
    async fn accepts_valid_signature() {
        let (handler, _pool) = handler_with_secret("whsec_topsecret");
        let now = 1_724_800_010;
        let header = sign("whsec_topsecret", now, PAYLOAD);

        let event = handler.verify_event_at(PAYLOAD, &header, now).unwrap();
        assert_eq!(event.id, "evt_100");
        assert_eq!(event.type_name(), "payment.failed");
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let (handler, _pool) = handler_with_secret("whsec_topsecret");
        let now = 1_724_800_010;
        let header = sign("whsec_other", now, PAYLOAD);

        let err = handler.verify_event_at(PAYLOAD, &header, now).unwrap_err();
        assert!(matches!(err, BillingError::WebhookSignatureInvalid));
    }

    #[tokio::test]
    async fn rejects_tampered_payload() {
        let (handler, _pool) = handler_with_secret("whsec_topsecret");
        let now = 1_724_800_010;
        let header = sign("whsec_topsecret", now, PAYLOAD);

        let mut tampered = PAYLOAD.to_vec();
        tampered.extend_from_slice(b" ");
        let err = handler.verify_event_at(&tampered, &header, now).unwrap_err();
        assert!(matches!(err, BillingError::WebhookSignatureInvalid));
    }

    #[tokio::test]
    async fn rejects_stale_timestamp() {
        let (handler, _pool) = handler_with_secret("whsec_topsecret");
        let signed_at = 1_724_800_000;
        let header = sign("whsec_topsecret", signed_at, PAYLOAD);

        let err = handler
            .verify_event_at(PAYLOAD, &header, signed_at + SIGNATURE_TOLERANCE_SECS + 1)
            .unwrap_err();
        assert!(matches!(err, BillingError::WebhookSignatureInvalid));
    }

    #[tokio::test]
    async fn accepts_timestamp_at_tolerance_boundary() {
        let (handler, _pool) = handler_with_secret("whsec_topsecret");
        let signed_at = 1_724_800_000;
        let header = sign("whsec_topsecret", signed_at, PAYLOAD);

        handler
            .verify_event_at(PAYLOAD, &header, signed_at + SIGNATURE_TOLERANCE_SECS)
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_malformed_header() {
        let (handler, _pool) = handler_with_secret("whsec_topsecret");

        for header in ["", "t=123", "v1=deadbeef", "nonsense"] {
            let err = handler
                .verify_event_at(PAYLOAD, header, 123)
                .unwrap_err();
            assert!(matches!(err, BillingError::WebhookSignatureInvalid));
        }
    }

    #[tokio::test]
    async fn verifies_unhandled_event_types() {
        // A correctly signed event of a type the pipeline does not process
        // must verify and parse as Unhandled, never bounce as a signature
        // failure (which would make the provider retry it forever).
        let payload: &[u8] = br#"{
            "id": "evt_200",
            "type": "invoice.finalized",
            "created": 1724800000,
            "data": { "invoice": "inv_1", "lines": [{"amount": 900}] }
        }"#;

        let (handler, _pool) = handler_with_secret("whsec_topsecret");
        let now = 1_724_800_010;
        let header = sign("whsec_topsecret", now, payload);

        let event = handler.verify_event_at(payload, &header, now).unwrap();
        assert_eq!(event.id, "evt_200");
        assert_eq!(event.type_name(), "unhandled");
    }

    #[test]
    fn redelivery_of_applied_event_is_acknowledged() {
        assert!(unclaimed_event_outcome("evt_1", Some("success")).is_ok());
    }

    #[test]
    fn redelivery_of_in_flight_event_is_acknowledged() {
        assert!(unclaimed_event_outcome("evt_1", Some("processing")).is_ok());
    }

    #[test]
    fn failed_event_is_never_acknowledged_as_duplicate() {
        // An errored record must not be reported as a handled duplicate: a
        // 200 here would stop redelivery and lose the event permanently.
        let err = unclaimed_event_outcome("evt_1", Some("error")).unwrap_err();
        assert!(matches!(err, BillingError::Internal(_)));

        let err = unclaimed_event_outcome("evt_1", None).unwrap_err();
        assert!(matches!(err, BillingError::Internal(_)));
    }
}
