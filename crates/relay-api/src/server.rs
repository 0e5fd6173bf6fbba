//! Axum server and routes.

use crate::config::CallbackRule;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use relay_coordinator::RequestCoordinator;
use relay_types::{ChatRequest, ChatResponse, JobRequest};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub coordinator: Arc<RequestCoordinator>,
    /// Used when a request carries no `callback_url`.
    pub callback_rule: Option<CallbackRule>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Validate, acknowledge immediately, and process in the background. The
/// outcome reaches the caller only through the callback.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let callback_url = req
        .callback_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| {
            state
                .callback_rule
                .as_ref()
                .map(|rule| rule.resolve(&req.sale_token))
        });
    let Some(callback_url) = callback_url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::error("no callback target configured")),
        );
    };
    let Some(job) = JobRequest::from_chat(req, callback_url) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::error("thread_id is required")),
        );
    };

    let request_id = job.request_id.clone();
    tracing::info!(
        request_id = %request_id,
        thread_id = %job.thread_id,
        client_id = %job.client_id,
        "chat request accepted"
    );
    // Detached: the task owns the request until its callback is sent.
    drop(state.coordinator.spawn(job));
    (
        StatusCode::ACCEPTED,
        Json(ChatResponse::accepted(
            request_id,
            chrono::Utc::now().to_rfc3339(),
        )),
    )
}

async fn handle_health() -> &'static str {
    "ok"
}
