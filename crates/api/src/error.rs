//! API error type and HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use switchboard_billing::BillingError;
use switchboard_shared::RateLimitError;
use switchboard_voice::VoiceError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("{0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited { retry_after_seconds: i64 },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidSignature => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate limited".to_string())
            }
            ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            // Internal details stay in the logs, not the response body
            ApiError::Database(e) => {
                tracing::error!(error = ?e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = match self {
            ApiError::RateLimited {
                retry_after_seconds,
            } => json!({ "error": message, "retry_after_seconds": retry_after_seconds }),
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::WebhookSignatureInvalid => ApiError::InvalidSignature,
            BillingError::InvalidPlan(plan) => {
                ApiError::Validation(format!("invalid plan: {plan}"))
            }
            BillingError::NoCustomer => {
                ApiError::Validation("no billing customer for this account".to_string())
            }
            BillingError::Database(e) => ApiError::Database(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::UnknownAgent(id) => ApiError::NotFound(format!("voice agent {id}")),
            VoiceError::OutboundNotConfigured => {
                ApiError::ServiceUnavailable("demo calling is not configured".to_string())
            }
            VoiceError::Database(e) => ApiError::Database(e),
            VoiceError::Billing(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::InvalidPhoneNumber => ApiError::Validation(
                "please provide a valid phone number in international format".to_string(),
            ),
            RateLimitError::RateLimited {
                retry_after_seconds,
            } => ApiError::RateLimited {
                retry_after_seconds,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_error_maps_to_400() {
        let resp = ApiError::InvalidSignature.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_agent_maps_to_404() {
        let err: ApiError = VoiceError::UnknownAgent("agent_x".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limit_maps_to_429() {
        let err: ApiError = RateLimitError::RateLimited {
            retry_after_seconds: 1800,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let resp = ApiError::Internal("secret detail".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
