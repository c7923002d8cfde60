//! Authentication middleware
//!
//! Validates the identity-provider bearer token and resolves it to a local
//! account, creating the account row on first sight. Handlers receive the
//! result as an [`AuthUser`] extension.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated account attached to the request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub external_id: String,
    pub email: Option<String>,
}

fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let claims = state
        .jwt_manager
        .verify(token)
        .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))?;

    let account_id = find_or_create_account(
        &state.pool,
        &claims.sub,
        claims.email.as_deref(),
        claims.name.as_deref(),
    )
    .await?;

    request.extensions_mut().insert(AuthUser {
        account_id,
        external_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

/// Resolve the identity-provider user id to a local account id, creating the
/// account on first authenticated access.
async fn find_or_create_account(
    pool: &sqlx::PgPool,
    external_id: &str,
    email: Option<&str>,
    name: Option<&str>,
) -> Result<Uuid, ApiError> {
    let (account_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO accounts (external_id, email, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (external_id) DO UPDATE SET
            email = COALESCE(NULLIF(EXCLUDED.email, ''), accounts.email),
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(external_id)
    .bind(email.unwrap_or_default())
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(account_id)
}
