use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum HaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid peer URL '{url}': {reason}")]
    InvalidPeerUrl { url: String, reason: String },

    #[error("Operation {operation} not supported on {kind} index")]
    UnsupportedOperation { kind: String, operation: String },

    #[error("Failed to apply forwarded {kind} '{id}': {message}")]
    LocalApply {
        kind: String,
        id: String,
        message: String,
    },

    #[error("Unknown index kind: {0}")]
    UnknownIndexKind(String),

    #[error("No receiver installed for {0}")]
    ReceiverNotInstalled(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("JSON error: {0}")]
    Json(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, HaError>;

impl From<std::io::Error> for HaError {
    fn from(e: std::io::Error) -> Self {
        HaError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for HaError {
    fn from(e: serde_json::Error) -> Self {
        HaError::Json(e.to_string())
    }
}

impl HaError {
    /// Convenience for collaborators reporting a failed local apply.
    pub fn local_apply(
        kind: impl Into<String>,
        id: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        HaError::LocalApply {
            kind: kind.into(),
            id: id.into(),
            message: message.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HaError::InvalidPeerUrl { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            HaError::UnsupportedOperation { .. } => StatusCode::METHOD_NOT_ALLOWED,
            HaError::LocalApply { .. } => StatusCode::CONFLICT,
            HaError::UnknownIndexKind(_) => StatusCode::NOT_FOUND,
            HaError::ReceiverNotInstalled(_) => StatusCode::SERVICE_UNAVAILABLE,
            HaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            HaError::Unauthorized => StatusCode::UNAUTHORIZED,
            HaError::Json(_) => StatusCode::BAD_REQUEST,
            HaError::Io(_) => StatusCode::CONFLICT,
        }
    }
}

// Axum IntoResponse implementation (feature-gated)
#[cfg(feature = "axum-support")]
use axum::response::{IntoResponse, Response};

/// Peers read the plain-text body of any non-204 answer as the rejection message.
#[cfg(feature = "axum-support")]
impl IntoResponse for HaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[REPL] request failed: {}", self);
        } else {
            tracing::debug!("[REPL] request rejected ({}): {}", status, self);
        }
        (
            status,
            [(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
