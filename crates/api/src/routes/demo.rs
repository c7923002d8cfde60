//! Public demo-call endpoint
//!
//! Unauthenticated, so it is guarded by the per-number rate limiter before
//! anything touches the voice provider.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DemoCallRequest {
    pub phone: String,
}

pub async fn request_demo_call(
    State(state): State<AppState>,
    Json(request): Json<DemoCallRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let normalized = state.demo_limiter.check(&request.phone).await?;

    let call = state.voice.client.initiate_outbound_call(&normalized).await?;

    tracing::info!(call_id = %call.call_id, "Demo call initiated");

    Ok(Json(json!({
        "success": true,
        "message": "You'll receive a call shortly!",
    })))
}
