//! Billing provider configuration and REST client
//!
//! Thin client for the provider's customer/checkout/portal endpoints. Each
//! operation is a single fallible call with no internal retry; recovery is the
//! provider's responsibility via webhook redelivery.

use serde::Deserialize;
use uuid::Uuid;

use switchboard_shared::Plan;

use crate::error::{BillingError, BillingResult};

const DEFAULT_API_BASE: &str = "https://api.billing.example.com/v1";

/// Billing configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// API secret key for outbound provider calls.
    pub secret_key: String,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// Provider price ids per purchasable plan.
    pub price_starter: String,
    pub price_pro: String,
    /// Frontend URLs the provider redirects back to.
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub portal_return_url: String,
    /// Provider API base URL (overridable for tests).
    pub api_base: String,
}

impl BillingConfig {
    pub fn from_env() -> BillingResult<Self> {
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            secret_key: require_env("BILLING_SECRET_KEY")?,
            webhook_secret: require_env("BILLING_WEBHOOK_SECRET")?,
            price_starter: require_env("BILLING_PRICE_STARTER")?,
            price_pro: require_env("BILLING_PRICE_PRO")?,
            checkout_success_url: format!("{frontend_url}/app?checkout=success"),
            checkout_cancel_url: format!("{frontend_url}/app/billing?checkout=canceled"),
            portal_return_url: format!("{frontend_url}/app/billing"),
            api_base: std::env::var("BILLING_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Provider price id for a purchasable plan.
    pub fn price_id(&self, plan: Plan) -> BillingResult<&str> {
        match plan {
            Plan::Starter => Ok(&self.price_starter),
            Plan::Pro => Ok(&self.price_pro),
            Plan::Free => Err(BillingError::InvalidPlan("free".to_string())),
        }
    }
}

fn require_env(name: &'static str) -> BillingResult<String> {
    std::env::var(name).map_err(|_| BillingError::Config(format!("{name} must be set")))
}

/// Reference to a billing customer created at the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRef {
    pub id: String,
}

/// A hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionRef {
    pub id: String,
    pub url: String,
}

/// A hosted customer portal session.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSessionRef {
    pub url: String,
}

/// REST client for the billing provider.
#[derive(Clone)]
pub struct BillingProviderClient {
    http: reqwest::Client,
    config: BillingConfig,
}

impl BillingProviderClient {
    pub fn new(config: BillingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Create a billing customer tagged with our account id.
    pub async fn create_customer(
        &self,
        account_id: Uuid,
        email: &str,
        name: Option<&str>,
    ) -> BillingResult<CustomerRef> {
        let mut params = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[account_id]".to_string(), account_id.to_string()),
        ];
        if let Some(name) = name {
            params.push(("name".to_string(), name.to_string()));
        }

        self.post("/customers", &params).await
    }

    /// Create a hosted checkout session for a plan purchase. The metadata is
    /// echoed back on the `checkout.completed` webhook and is how the event is
    /// tied back to the account.
    pub async fn create_checkout_session(
        &self,
        account_id: Uuid,
        customer_id: &str,
        plan: Plan,
    ) -> BillingResult<CheckoutSessionRef> {
        let price_id = self.config.price_id(plan)?;

        let params = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[account_id]".to_string(), account_id.to_string()),
            ("metadata[plan]".to_string(), plan.as_str().to_string()),
            (
                "success_url".to_string(),
                self.config.checkout_success_url.clone(),
            ),
            (
                "cancel_url".to_string(),
                self.config.checkout_cancel_url.clone(),
            ),
        ];

        self.post("/checkout/sessions", &params).await
    }

    /// Create a customer portal session for self-service plan management.
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
    ) -> BillingResult<PortalSessionRef> {
        let params = vec![
            ("customer".to_string(), customer_id.to_string()),
            (
                "return_url".to_string(),
                self.config.portal_return_url.clone(),
            ),
        ];

        self.post("/billing_portal/sessions", &params).await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> BillingResult<T> {
        let url = format!("{}{}", self.config.api_base, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, path, body = %body, "Billing provider request failed");
            return Err(BillingError::ProviderApi(format!(
                "{path} returned {status}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_base: String) -> BillingConfig {
        BillingConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_test".to_string(),
            price_starter: "price_starter_1".to_string(),
            price_pro: "price_pro_1".to_string(),
            checkout_success_url: "http://localhost:5173/app?checkout=success".to_string(),
            checkout_cancel_url: "http://localhost:5173/app/billing?checkout=canceled".to_string(),
            portal_return_url: "http://localhost:5173/app/billing".to_string(),
            api_base,
        }
    }

    #[test]
    fn price_id_rejects_free_plan() {
        let config = test_config("http://unused".to_string());
        assert!(config.price_id(Plan::Free).is_err());
        assert_eq!(config.price_id(Plan::Starter).unwrap(), "price_starter_1");
        assert_eq!(config.price_id(Plan::Pro).unwrap(), "price_pro_1");
    }

    #[tokio::test]
    async fn create_checkout_session_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/checkout/sessions")
            .match_header("authorization", "Bearer sk_test_123")
            .with_status(200)
            .with_body(r#"{"id":"cs_1","url":"https://checkout.example.com/cs_1"}"#)
            .create_async()
            .await;

        let client = BillingProviderClient::new(test_config(server.url()));
        let session = client
            .create_checkout_session(Uuid::new_v4(), "cus_1", Plan::Starter)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.id, "cs_1");
        assert_eq!(session.url, "https://checkout.example.com/cs_1");
    }

    #[tokio::test]
    async fn provider_error_status_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/customers")
            .with_status(402)
            .with_body(r#"{"error":"card_declined"}"#)
            .create_async()
            .await;

        let client = BillingProviderClient::new(test_config(server.url()));
        let err = client
            .create_customer(Uuid::new_v4(), "owner@example.com", None)
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::ProviderApi(_)));
    }
}
