//! Billing routes: subscription status, checkout, and portal sessions

use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;

use switchboard_billing::{CheckoutResponse, PortalResponse, UsageSummary};
use switchboard_shared::Plan;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Current plan and quota, with free-tier defaults before any checkout.
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<UsageSummary>> {
    let summary = state.billing.usage.summary(user.account_id).await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan: String,
}

pub async fn start_checkout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let plan = Plan::from_str(&request.plan)
        .ok_or_else(|| ApiError::Validation(format!("invalid plan: {}", request.plan)))?;

    let email = user
        .email
        .as_deref()
        .ok_or_else(|| ApiError::Validation("account has no email on file".to_string()))?;

    let response = state
        .billing
        .checkout
        .start_checkout(user.account_id, email, None, plan)
        .await?;

    Ok(Json(response))
}

pub async fn portal_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<PortalResponse>> {
    let response = state.billing.portal.portal_url(user.account_id).await?;
    Ok(Json(response))
}
