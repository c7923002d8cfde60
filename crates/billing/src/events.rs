//! Billing provider webhook event payloads
//!
//! The provider delivers lifecycle events as JSON with a top-level `id`,
//! `type`, `created` (unix seconds) and a `data` object. Each payload carries
//! the full current state for the fields it covers, which is what makes
//! last-write-wins application safe.

use serde::de::Error as _;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A verified billing lifecycle event.
#[derive(Debug, Clone)]
pub struct BillingEvent {
    /// Provider-assigned event id, the idempotency key.
    pub id: String,
    /// Unix timestamp at which the provider created the event.
    pub created: i64,
    pub payload: EventPayload,
}

/// The envelope is parsed in two steps: the `type` discriminant first, then
/// the matching payload out of `data`. Unknown types map to
/// [`EventPayload::Unhandled`] regardless of what `data` carries, so a
/// correctly signed event the pipeline does not process is still acknowledged
/// instead of bouncing as a parse failure.
impl<'de> Deserialize<'de> for BillingEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Envelope {
            id: String,
            created: i64,
            #[serde(rename = "type")]
            event_type: String,
            #[serde(default)]
            data: serde_json::Value,
        }

        let envelope = Envelope::deserialize(deserializer)?;

        let payload = match envelope.event_type.as_str() {
            "checkout.completed" => EventPayload::CheckoutCompleted(
                serde_json::from_value(envelope.data).map_err(D::Error::custom)?,
            ),
            "subscription.updated" => EventPayload::SubscriptionUpdated(
                serde_json::from_value(envelope.data).map_err(D::Error::custom)?,
            ),
            "subscription.deleted" => EventPayload::SubscriptionDeleted(
                serde_json::from_value(envelope.data).map_err(D::Error::custom)?,
            ),
            "payment.failed" => EventPayload::PaymentFailed(
                serde_json::from_value(envelope.data).map_err(D::Error::custom)?,
            ),
            _ => EventPayload::Unhandled,
        };

        Ok(BillingEvent {
            id: envelope.id,
            created: envelope.created,
            payload,
        })
    }
}

impl BillingEvent {
    /// Provider event creation time, used for stale-event ordering checks.
    pub fn created_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.created)
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    pub fn type_name(&self) -> &'static str {
        match &self.payload {
            EventPayload::CheckoutCompleted(_) => "checkout.completed",
            EventPayload::SubscriptionUpdated(_) => "subscription.updated",
            EventPayload::SubscriptionDeleted(_) => "subscription.deleted",
            EventPayload::PaymentFailed(_) => "payment.failed",
            EventPayload::Unhandled => "unhandled",
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionUpdated(SubscriptionUpdated),
    SubscriptionDeleted(SubscriptionDeleted),
    PaymentFailed(PaymentFailed),
    /// Event types this pipeline does not process. Acknowledged without effect
    /// so the provider does not redeliver them.
    Unhandled,
}

/// A completed checkout session: the account purchased a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCompleted {
    /// Billing customer reference.
    pub customer: String,
    /// Billing subscription reference created by the checkout.
    pub subscription: String,
    pub metadata: CheckoutMetadata,
}

/// Metadata attached when the checkout session was created (see checkout.rs).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutMetadata {
    pub account_id: Uuid,
    pub plan: String,
}

/// The provider's current view of a subscription. `status` is copied verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionUpdated {
    /// Billing subscription reference. Events are matched on this, not on the
    /// account id — the provider does not carry the account id here.
    pub id: String,
    pub status: String,
    /// Unix timestamp of the current period end.
    pub current_period_end: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionDeleted {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentFailed {
    /// Billing customer reference carried on the failed invoice.
    pub customer: String,
}
