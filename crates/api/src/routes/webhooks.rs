//! Inbound webhook endpoints
//!
//! The billing webhook is verified against the raw body bytes before any JSON
//! parsing. Processing failures return 5xx so the provider redelivers; a bad
//! signature returns 400 and is never retried into state.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use switchboard_voice::{CallCompletedEvent, CallOutcome};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const BILLING_SIGNATURE_HEADER: &str = "billing-signature";
const IDENTITY_SECRET_HEADER: &str = "identity-webhook-secret";

pub async fn billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let signature = headers
        .get(BILLING_SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    let event = state.billing.webhooks.verify_event(body.as_ref(), signature)?;
    state.billing.webhooks.handle_event(event).await?;

    Ok(Json(json!({ "received": true })))
}

pub async fn voice_webhook(
    State(state): State<AppState>,
    Json(event): Json<CallCompletedEvent>,
) -> ApiResult<Json<serde_json::Value>> {
    match state.voice.recorder.record_call(event).await? {
        CallOutcome::Recorded { call_id } => {
            Ok(Json(json!({ "received": true, "call_id": call_id })))
        }
        CallOutcome::Duplicate => Ok(Json(json!({ "received": true, "duplicate": true }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: IdentityUser,
}

#[derive(Debug, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Identity-provider user lifecycle events. Account deletion cascades to
/// subscriptions, voice agents, and calls.
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<IdentityEvent>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(secret) = &state.config.identity_webhook_secret {
        let provided = headers
            .get(IDENTITY_SECRET_HEADER)
            .and_then(|h| h.to_str().ok());
        if provided != Some(secret.as_str()) {
            return Err(ApiError::Unauthorized(
                "invalid identity webhook secret".to_string(),
            ));
        }
    }

    match event.event_type.as_str() {
        "user.created" => {
            sqlx::query(
                r#"
                INSERT INTO accounts (external_id, email, name)
                VALUES ($1, $2, $3)
                ON CONFLICT (external_id) DO UPDATE SET
                    email = COALESCE(NULLIF(EXCLUDED.email, ''), accounts.email),
                    name = COALESCE(EXCLUDED.name, accounts.name),
                    updated_at = NOW()
                "#,
            )
            .bind(&event.data.id)
            .bind(event.data.email.as_deref().unwrap_or_default())
            .bind(&event.data.name)
            .execute(&state.pool)
            .await?;
            tracing::info!(external_id = %event.data.id, "Identity user created");
        }
        "user.deleted" => {
            let result = sqlx::query("DELETE FROM accounts WHERE external_id = $1")
                .bind(&event.data.id)
                .execute(&state.pool)
                .await?;
            tracing::info!(
                external_id = %event.data.id,
                deleted = result.rows_affected(),
                "Identity user deleted"
            );
        }
        other => {
            tracing::debug!(event_type = %other, "Ignoring identity event");
        }
    }

    Ok(Json(json!({ "received": true })))
}
