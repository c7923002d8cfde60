//! Billing error types

/// Errors produced by the billing crate.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// The webhook signature did not verify against the shared secret.
    /// Permanent rejection — the caller must respond 400 and mutate nothing.
    #[error("invalid webhook signature")]
    WebhookSignatureInvalid,

    #[error("unknown plan: {0}")]
    InvalidPlan(String),

    #[error("account has no billing customer")]
    NoCustomer,

    #[error("billing provider API error: {0}")]
    ProviderApi(String),

    #[error("billing configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal billing error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::ProviderApi(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
