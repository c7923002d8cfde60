//! Call history and dashboard stats

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use switchboard_billing::usage_percent;
use switchboard_voice::CallRecord;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CallSummary {
    pub id: Uuid,
    pub caller_name: Option<String>,
    pub caller_phone: Option<String>,
    pub duration_seconds: i32,
    pub summary: String,
    pub status: String,
    pub urgency: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub appointment_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct CallListResponse {
    pub calls: Vec<CallSummary>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

pub async fn list_calls(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListCallsQuery>,
) -> ApiResult<Json<CallListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * limit;

    let search = query
        .search
        .as_deref()
        .map(|s| format!("%{}%", s.trim()));

    let calls = sqlx::query_as::<_, CallSummary>(
        r#"
        SELECT id, caller_name, caller_phone, duration_seconds, summary,
               status, urgency, appointment_at, created_at
        FROM calls
        WHERE account_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR caller_name ILIKE $3
               OR caller_phone ILIKE $3 OR summary ILIKE $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(user.account_id)
    .bind(&query.status)
    .bind(&search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM calls
        WHERE account_id = $1
          AND ($2::text IS NULL OR status = $2)
          AND ($3::text IS NULL OR caller_name ILIKE $3
               OR caller_phone ILIKE $3 OR summary ILIKE $3)
        "#,
    )
    .bind(user.account_id)
    .bind(&query.status)
    .bind(&search)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(CallListResponse {
        calls,
        total,
        page,
        limit,
    }))
}

pub async fn get_call(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<Uuid>,
) -> ApiResult<Json<CallRecord>> {
    let call = sqlx::query_as::<_, CallRecord>(
        "SELECT * FROM calls WHERE id = $1 AND account_id = $2",
    )
    .bind(call_id)
    .bind(user.account_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("call {call_id}")))?;

    Ok(Json(call))
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_calls: i64,
    pub calls_this_month: i64,
    pub appointments_booked: i64,
    pub avg_duration_seconds: i64,
    pub calls_used: i32,
    pub calls_limit: i32,
    pub usage_percent: u8,
    pub plan: String,
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<DashboardStats>> {
    let (total_calls, calls_this_month, appointments_booked, avg_duration_seconds): (
        i64,
        i64,
        i64,
        i64,
    ) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE created_at >= date_trunc('month', NOW())),
            COUNT(*) FILTER (WHERE appointment_at IS NOT NULL),
            COALESCE(ROUND(AVG(duration_seconds)), 0)::BIGINT
        FROM calls
        WHERE account_id = $1
        "#,
    )
    .bind(user.account_id)
    .fetch_one(&state.pool)
    .await?;

    let usage = state.billing.usage.summary(user.account_id).await?;

    Ok(Json(DashboardStats {
        total_calls,
        calls_this_month,
        appointments_booked,
        avg_duration_seconds,
        usage_percent: usage_percent(usage.calls_used, usage.calls_limit),
        calls_used: usage.calls_used,
        calls_limit: usage.calls_limit,
        plan: usage.plan,
    }))
}
