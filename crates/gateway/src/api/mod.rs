pub mod auth;
pub mod catalogue;
pub mod chat;
pub mod guard;
pub mod health;
pub mod history;
pub mod ops;
pub mod sessions;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use pa_domain::error::Error;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (`/health`), **protected** (`/api/*`,
/// gated behind the API bearer-token middleware) and **ops** (`/ops/*`,
/// gated per handler by [`guard::AdminGuard`]).
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health::health));

    let protected = Router::new()
        // Sessions
        .route("/api/sessions/create", post(sessions::create_session))
        .route("/api/sessions/list", get(sessions::list_sessions))
        .route("/api/sessions/rename", post(sessions::rename_session))
        .route("/api/sessions/delete", post(sessions::delete_session))
        // History
        .route("/api/history", get(history::get_history))
        .route("/api/history/clear", post(history::clear_history))
        // Chat
        .route("/api/chat", post(chat::chat_stream))
        .route("/api/chat/sync", post(chat::chat_sync))
        // Catalogue
        .route("/api/catalogue", get(catalogue::get_catalogue))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    let ops = Router::new()
        .route("/ops/sessions", get(ops::list_sessions))
        .route("/ops/sessions/:session_id/trace", get(ops::session_trace));

    public.merge(protected).merge(ops)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a domain error onto an HTTP response.
pub(crate) fn domain_error(err: &Error) -> Response {
    let status = match err {
        Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidSessionId(_) => StatusCode::BAD_REQUEST,
        Error::UpstreamUnavailable { .. } | Error::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(kind = err.kind(), error = %err, "request failed");
    }
    api_error(status, err.to_string())
}

/// Reject blank required fields with a 400.
pub(crate) fn require(field: &str, value: &str) -> Result<(), Response> {
    if value.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{field} must not be empty"),
        ));
    }
    Ok(())
}

/// Validate a client-supplied session id before it reaches storage.
pub(crate) fn require_session_id(value: &str) -> Result<&str, Response> {
    require("session_id", value)?;
    let session_id = value.trim();
    if !pa_sessions::is_valid_session_id(session_id) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "session_id may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(session_id)
}
