//! Customer portal sessions

use serde::Serialize;
use uuid::Uuid;

use crate::client::BillingProviderClient;
use crate::error::{BillingError, BillingResult};
use crate::subscriptions::SubscriptionService;

#[derive(Debug, Clone, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Clone)]
pub struct PortalService {
    client: BillingProviderClient,
    subscriptions: SubscriptionService,
}

impl PortalService {
    pub fn new(client: BillingProviderClient, subscriptions: SubscriptionService) -> Self {
        Self {
            client,
            subscriptions,
        }
    }

    /// Create a hosted portal session for self-service billing management.
    /// Requires a real billing customer, which only exists after a checkout
    /// has been initiated.
    pub async fn portal_url(&self, account_id: Uuid) -> BillingResult<PortalResponse> {
        let record = self
            .subscriptions
            .get_subscription(account_id)
            .await?
            .ok_or(BillingError::NoCustomer)?;

        if record.billing_customer_id.starts_with("pending_") {
            return Err(BillingError::NoCustomer);
        }

        let session = self
            .client
            .create_portal_session(&record.billing_customer_id)
            .await?;

        Ok(PortalResponse { url: session.url })
    }
}
