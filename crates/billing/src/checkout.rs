//! Checkout session creation
//!
//! Initiating a checkout lazily creates the billing customer and the local
//! free-tier subscription record, then hands the user a hosted checkout URL.
//! The actual plan change only happens when the `checkout.completed` webhook
//! confirms payment.

use serde::Serialize;
use uuid::Uuid;

use switchboard_shared::Plan;

use crate::client::BillingProviderClient;
use crate::error::{BillingError, BillingResult};
use crate::subscriptions::SubscriptionService;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    client: BillingProviderClient,
    subscriptions: SubscriptionService,
}

impl CheckoutService {
    pub fn new(client: BillingProviderClient, subscriptions: SubscriptionService) -> Self {
        Self {
            client,
            subscriptions,
        }
    }

    /// Start a checkout for a purchasable plan.
    pub async fn start_checkout(
        &self,
        account_id: Uuid,
        email: &str,
        name: Option<&str>,
        plan: Plan,
    ) -> BillingResult<CheckoutResponse> {
        if !plan.purchasable() {
            return Err(BillingError::InvalidPlan(plan.as_str().to_string()));
        }

        let customer_id = self.ensure_customer(account_id, email, name).await?;

        let session = self
            .client
            .create_checkout_session(account_id, &customer_id, plan)
            .await?;

        tracing::info!(
            %account_id,
            plan = %plan,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutResponse { url: session.url })
    }

    /// Return the account's billing customer id, creating the customer (and
    /// the free-tier subscription record) on first checkout attempt.
    async fn ensure_customer(
        &self,
        account_id: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> BillingResult<String> {
        let existing = self.subscriptions.get_subscription(account_id).await?;

        if let Some(record) = &existing {
            if !record.billing_customer_id.starts_with("pending_") {
                return Ok(record.billing_customer_id.clone());
            }
        }

        let customer = self.client.create_customer(account_id, email, name).await?;

        self.subscriptions.ensure_free_subscription(account_id).await?;
        self.subscriptions
            .set_billing_customer(account_id, &customer.id)
            .await?;

        tracing::info!(%account_id, customer_id = %customer.id, "Billing customer created");

        Ok(customer.id)
    }
}
