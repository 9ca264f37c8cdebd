use crate::handlers::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use hasync::{DomainEvent, HaError, IndexMeta, IndexOperation};
use std::sync::Arc;

type ApplyResult = Result<StatusCode, HaError>;

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8], what: &str) -> Result<T, HaError> {
    serde_json::from_slice(body)
        .map_err(|e| HaError::InvalidRequest(format!("malformed {} body: {}", what, e)))
}

fn parse_meta(body: &[u8]) -> Result<Option<IndexMeta>, HaError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    parse_json(body, "index meta").map(Some)
}

/// POST /internal/replication/cache/:cache_name
/// Body is the JSON cache key.
pub async fn evict_cache(
    State(state): State<Arc<AppState>>,
    Path(cache_name): Path<String>,
    body: Bytes,
) -> ApplyResult {
    let key: serde_json::Value = parse_json(&body, "cache key")?;
    let receiver = state
        .manager
        .cache_receiver()
        .ok_or_else(|| HaError::ReceiverNotInstalled("cache evictions".to_string()))?;

    receiver.apply(&cache_name, &key).await?;
    tracing::debug!("[REPL] applied forwarded eviction of {} from {}", key, cache_name);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /internal/replication/event/:event_type
/// Body is the JSON domain event; its type must match the path.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Path(event_type): Path<String>,
    body: Bytes,
) -> ApplyResult {
    let event: DomainEvent = parse_json(&body, "event")?;
    if event.event_type != event_type {
        return Err(HaError::InvalidRequest(format!(
            "event type '{}' does not match endpoint '{}'",
            event.event_type, event_type
        )));
    }
    let receiver = state
        .manager
        .event_receiver()
        .ok_or_else(|| HaError::ReceiverNotInstalled("events".to_string()))?;

    receiver.apply(event).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /internal/replication/index/:kind/:id
pub async fn index_entity(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    body: Bytes,
) -> ApplyResult {
    apply_index(&state, &kind, &id, IndexOperation::Index, &body).await
}

/// DELETE /internal/replication/index/:kind/:id
pub async fn delete_entity(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    body: Bytes,
) -> ApplyResult {
    apply_index(&state, &kind, &id, IndexOperation::Delete, &body).await
}

async fn apply_index(
    state: &AppState,
    kind: &str,
    id: &str,
    operation: IndexOperation,
    body: &[u8],
) -> ApplyResult {
    let receiver = state
        .manager
        .index_receiver(kind)
        .ok_or_else(|| HaError::UnknownIndexKind(kind.to_string()))?;
    let meta = parse_meta(body)?;

    match receiver.apply(id, operation, meta.as_ref()).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            tracing::warn!(
                "[REPL] forwarded {} {} '{}' rejected: {}",
                operation,
                kind,
                id,
                e
            );
            Err(e)
        }
    }
}

/// GET /internal/status
/// Forwarding status for monitoring.
pub async fn replication_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.status())
}
