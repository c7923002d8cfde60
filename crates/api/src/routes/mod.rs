//! HTTP routes

pub mod billing;
pub mod calls;
pub mod demo;
pub mod settings;
pub mod voice;
pub mod webhooks;

use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::json;

use crate::auth::require_auth;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/api/billing/subscription", get(billing::get_subscription))
        .route("/api/billing/checkout", post(billing::start_checkout))
        .route("/api/billing/portal", post(billing::portal_session))
        .route("/api/calls", get(calls::list_calls))
        .route("/api/calls/{id}", get(calls::get_call))
        .route("/api/dashboard/stats", get(calls::dashboard_stats))
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/api/settings/onboard", post(settings::onboard))
        .route("/api/voice/setup", post(voice::setup_agent))
        .route("/api/voice", get(voice::get_agent))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/webhooks/billing", post(webhooks::billing_webhook))
        .route("/api/webhooks/voice", post(webhooks::voice_webhook))
        .route("/api/webhooks/identity", post(webhooks::identity_webhook))
        .route("/api/demo/call", post(demo::request_demo_call))
        .merge(authed)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
