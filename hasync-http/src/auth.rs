use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hasync::config::HttpConfig;
use hasync::HaError;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::handlers::AppState;

/// Requests that never need credentials: the routing layer's health probe and
/// the monitoring status.
fn is_public(method: &Method, path: &str) -> bool {
    *method == Method::GET && (path == "/health" || path == "/internal/status")
}

/// `(user, password)` from an `Authorization: Basic ...` header.
pub fn extract_basic_credentials(request: &Request) -> Option<(String, String)> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn credentials_match(user: &str, password: &str, expected: &HttpConfig) -> bool {
    let user_ok = user.as_bytes().ct_eq(expected.user.as_bytes());
    let password_ok = password.as_bytes().ct_eq(expected.password.as_bytes());
    (user_ok & password_ok).into()
}

fn unauthorized() -> Response {
    let mut response = HaError::Unauthorized.into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"hasync\""),
    );
    response
}

/// Basic authentication against `http.user` / `http.password`. With no user
/// configured every request passes.
pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if is_public(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let http = &state.manager.config().http;
    if !http.has_credentials() {
        return Ok(next.run(request).await);
    }

    match extract_basic_credentials(&request) {
        Some((user, password)) if credentials_match(&user, &password, http) => {
            Ok(next.run(request).await)
        }
        Some((user, _)) => {
            tracing::warn!(
                "[REPL] rejected {} {} for user '{}'",
                request.method(),
                request.uri().path(),
                user
            );
            Err(unauthorized())
        }
        None => Err(unauthorized()),
    }
}
