//! Server configuration loaded from environment variables

/// API server configuration. Required variables fail fast at startup; the
/// billing and voice services load their own config from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Shared secret for verifying identity-provider JWTs (HS256).
    pub identity_jwt_secret: String,
    /// Optional shared secret the identity provider sends on webhooks.
    pub identity_webhook_secret: Option<String>,
    /// Comma-separated CORS origin allowlist.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = require("DATABASE_URL")?;
        let identity_jwt_secret = require("IDENTITY_JWT_SECRET")?;

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            bind_address,
            identity_jwt_secret,
            identity_webhook_secret: std::env::var("IDENTITY_WEBHOOK_SECRET").ok(),
            allowed_origins,
        })
    }
}

fn require(name: &'static str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set"))
}
