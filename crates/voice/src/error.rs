//! Voice pipeline error types

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The webhook named an agent id we have no config for. Permanent — the
    /// provider should stop retrying, so this maps to a 404.
    #[error("unknown voice agent: {0}")]
    UnknownAgent(String),

    #[error("outbound calling is not configured")]
    OutboundNotConfigured,

    #[error("voice provider API error: {0}")]
    ProviderApi(String),

    #[error("voice configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("billing error: {0}")]
    Billing(#[from] switchboard_billing::BillingError),
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        VoiceError::ProviderApi(err.to_string())
    }
}

pub type VoiceResult<T> = Result<T, VoiceError>;
