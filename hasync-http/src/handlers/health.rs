use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use super::AppState;

/// GET /health
/// 204 while this node accepts traffic, 503 otherwise.
pub async fn health(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.manager.health().is_healthy() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// PUT /health
pub async fn mark_ready(State(state): State<Arc<AppState>>) -> StatusCode {
    state.manager.health().set_healthy(true);
    StatusCode::NO_CONTENT
}

/// DELETE /health
pub async fn mark_unavailable(State(state): State<Arc<AppState>>) -> StatusCode {
    state.manager.health().set_healthy(false);
    StatusCode::NO_CONTENT
}
