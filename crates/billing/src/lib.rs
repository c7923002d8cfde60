// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Switchboard billing
//!
//! Billing-provider integration for the receptionist product:
//!
//! - **Webhooks**: signature verification over raw bytes and at-most-once
//!   application of lifecycle events
//! - **Subscriptions**: the plan/status state machine
//! - **Usage metering**: atomic per-account call counters and quota reads
//! - **Checkout / Portal**: hosted session creation

pub mod checkout;
pub mod client;
pub mod error;
pub mod events;
pub mod portal;
pub mod subscriptions;
pub mod usage;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

pub use checkout::{CheckoutResponse, CheckoutService};
pub use client::{
    BillingConfig, BillingProviderClient, CheckoutSessionRef, CustomerRef, PortalSessionRef,
};
pub use error::{BillingError, BillingResult};
pub use events::{
    BillingEvent, CheckoutCompleted, EventPayload, PaymentFailed, SubscriptionDeleted,
    SubscriptionUpdated,
};
pub use portal::{PortalResponse, PortalService};
pub use subscriptions::{SubscriptionRecord, SubscriptionService};
pub use usage::{usage_percent, UsageMeter, UsageSummary};
pub use webhooks::WebhookHandler;

use sqlx::PgPool;

/// Main billing service that combines all billing functionality.
pub struct BillingService {
    pub checkout: CheckoutService,
    pub portal: PortalService,
    pub subscriptions: SubscriptionService,
    pub usage: UsageMeter,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a billing service from environment variables.
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        Ok(Self::new(BillingConfig::from_env()?, pool))
    }

    /// Create a billing service with explicit config.
    pub fn new(config: BillingConfig, pool: PgPool) -> Self {
        let client = BillingProviderClient::new(config.clone());
        let subscriptions = SubscriptionService::new(pool.clone());

        Self {
            checkout: CheckoutService::new(client.clone(), subscriptions.clone()),
            portal: PortalService::new(client, subscriptions.clone()),
            subscriptions,
            usage: UsageMeter::new(pool.clone()),
            webhooks: WebhookHandler::new(config, pool),
        }
    }
}
