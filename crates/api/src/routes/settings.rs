//! Account profile and onboarding

use axum::extract::{Extension, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use switchboard_voice::AgentSettings;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AccountProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub phone: Option<String>,
    pub onboarded: bool,
}

async fn load_profile(state: &AppState, account_id: Uuid) -> ApiResult<AccountProfile> {
    sqlx::query_as::<_, AccountProfile>(
        r#"
        SELECT id, email, name, business_name, industry, phone, onboarded
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("account {account_id}")))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<AccountProfile>> {
    Ok(Json(load_profile(&state, user.account_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub phone: Option<String>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<AccountProfile>> {
    sqlx::query(
        r#"
        UPDATE accounts SET
            name = COALESCE($2, name),
            business_name = COALESCE($3, business_name),
            industry = COALESCE($4, industry),
            phone = COALESCE($5, phone),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.account_id)
    .bind(&request.name)
    .bind(&request.business_name)
    .bind(&request.industry)
    .bind(&request.phone)
    .execute(&state.pool)
    .await?;

    Ok(Json(load_profile(&state, user.account_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub business_name: String,
    pub industry: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub business_context: Option<String>,
}

/// First-run setup: stores the business profile, starts the free tier, and
/// provisions the receptionist agent.
pub async fn onboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<OnboardRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let business_name = request.business_name.trim();
    if business_name.is_empty() {
        return Err(ApiError::Validation("business_name is required".to_string()));
    }

    sqlx::query(
        r#"
        UPDATE accounts SET
            business_name = $2,
            industry = COALESCE($3, industry),
            phone = COALESCE($4, phone),
            onboarded = TRUE,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.account_id)
    .bind(business_name)
    .bind(&request.industry)
    .bind(&request.phone)
    .execute(&state.pool)
    .await?;

    state
        .billing
        .subscriptions
        .ensure_free_subscription(user.account_id)
        .await?;

    let agent = state
        .voice
        .provisioner
        .setup_agent(
            user.account_id,
            business_name,
            AgentSettings {
                greeting: request.greeting,
                business_context: request.business_context,
                voice_id: None,
            },
        )
        .await?;

    tracing::info!(account_id = %user.account_id, "Account onboarded");

    Ok(Json(json!({
        "onboarded": true,
        "agent_id": agent.id,
    })))
}
