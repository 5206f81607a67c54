//! Bearer-token middleware for `/api/*`.
//!
//! The token named by `server.api_token_env` (default `PA_API_TOKEN`) is read
//! once at startup and only its SHA-256 digest is kept in `AppState`. When
//! the env var is unset every request passes (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

use super::api_error;

/// Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token_hash else {
        return next.run(req).await;
    };
    if !token_matches(req.headers(), expected) {
        tracing::debug!(path = %req.uri().path(), "rejected request without a valid API token");
        return api_error(StatusCode::UNAUTHORIZED, "invalid or missing API token");
    }
    next.run(req).await
}

/// Compare the bearer token's digest with `expected` in constant time.
pub(crate) fn token_matches(headers: &HeaderMap, expected: &[u8]) -> bool {
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");
    let provided_hash = Sha256::digest(provided.as_bytes());
    bool::from(provided_hash.ct_eq(expected))
}
