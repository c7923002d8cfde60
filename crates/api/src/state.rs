//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use switchboard_billing::BillingService;
use switchboard_shared::DemoCallLimiter;
use switchboard_voice::VoiceService;

use crate::auth::JwtManager;
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt_manager: JwtManager,
    pub billing: Arc<BillingService>,
    pub voice: Arc<VoiceService>,
    /// Process-local limiter for unauthenticated demo calls.
    pub demo_limiter: DemoCallLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let jwt_manager = JwtManager::new(&config.identity_jwt_secret);

        let billing = Arc::new(BillingService::from_env(pool.clone())?);
        tracing::info!("Billing service initialized");

        let voice = Arc::new(VoiceService::from_env(pool.clone())?);
        tracing::info!("Voice service initialized");

        Ok(Self {
            pool,
            config,
            jwt_manager,
            billing,
            voice,
            demo_limiter: DemoCallLimiter::new(),
        })
    }
}
