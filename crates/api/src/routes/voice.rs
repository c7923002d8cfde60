//! Receptionist agent routes

use axum::extract::{Extension, State};
use axum::Json;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use switchboard_voice::{AgentSettings, VoiceAgentRecord};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub provider_agent_id: Option<String>,
    pub greeting: String,
    pub business_context: String,
    pub voice_id: String,
    pub phone_number: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<VoiceAgentRecord> for AgentResponse {
    fn from(record: VoiceAgentRecord) -> Self {
        Self {
            id: record.id,
            provider_agent_id: record.provider_agent_id,
            greeting: record.greeting,
            business_context: record.business_context,
            voice_id: record.voice_id,
            phone_number: record.phone_number,
            updated_at: record.updated_at,
        }
    }
}

pub async fn get_agent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<AgentResponse>> {
    let record = state
        .voice
        .provisioner
        .get_agent(user.account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("voice agent not configured".to_string()))?;

    Ok(Json(record.into()))
}

/// Create or update the account's receptionist agent at the provider.
pub async fn setup_agent(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(settings): Json<AgentSettings>,
) -> ApiResult<Json<AgentResponse>> {
    let (business_name,): (Option<String>,) =
        sqlx::query_as("SELECT business_name FROM accounts WHERE id = $1")
            .bind(user.account_id)
            .fetch_one(&state.pool)
            .await?;

    let business_name = business_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            ApiError::Validation("complete onboarding before configuring the agent".to_string())
        })?;

    let record = state
        .voice
        .provisioner
        .setup_agent(user.account_id, &business_name, settings)
        .await?;

    Ok(Json(record.into()))
}
