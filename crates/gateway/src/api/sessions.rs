//! Session management endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use pa_domain::error::Error;

use crate::state::AppState;

use super::{api_error, domain_error, require, require_session_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/sessions/create
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub user_id: String,
    /// Defaults to `sessions.default_title`.
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Response {
    if let Err(resp) = require("user_id", &body.user_id) {
        return resp;
    }
    let title = body
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&state.config.sessions.default_title);

    match state.sessions.create(body.user_id.trim(), title) {
        Ok(entry) => Json(serde_json::json!({
            "session_id": entry.session_id,
            "title": entry.title,
            "created_at": entry.created_at,
        }))
        .into_response(),
        Err(e) => domain_error(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/sessions/list?user_id=
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub user_id: String,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Response {
    if let Err(resp) = require("user_id", &query.user_id) {
        return resp;
    }
    let sessions = state.sessions.list_for_user(query.user_id.trim());
    Json(serde_json::json!({
        "count": sessions.len(),
        "data": sessions,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/sessions/rename
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct RenameSessionBody {
    pub session_id: String,
    pub title: String,
}

pub async fn rename_session(
    State(state): State<AppState>,
    Json(body): Json<RenameSessionBody>,
) -> Response {
    let session_id = match require_session_id(&body.session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(resp) = require("title", &body.title) {
        return resp;
    }
    match state.sessions.rename(session_id, body.title.trim()) {
        Ok(entry) => Json(serde_json::json!({
            "session_id": entry.session_id,
            "title": entry.title,
        }))
        .into_response(),
        Err(e) => domain_error(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/sessions/delete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SessionIdBody {
    pub session_id: String,
}

/// Delete a session together with its history, slot memory and traces.
/// Waits for any in-flight turn of the session to finish first. Sessions
/// that only exist through chat (no catalogue entry) are cleaned up too.
pub async fn delete_session(
    State(state): State<AppState>,
    Json(body): Json<SessionIdBody>,
) -> Response {
    let session_id = match require_session_id(&body.session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let _permit = match state.session_locks.acquire(session_id).await {
        Ok(p) => p,
        Err(e) => return api_error(StatusCode::CONFLICT, e.to_string()),
    };

    let registered = match state.sessions.delete(session_id) {
        Ok(_) => true,
        Err(Error::SessionNotFound(_)) => false,
        Err(e) => return domain_error(&e),
    };
    if let Err(e) = state.transcripts.clear(session_id).await {
        return domain_error(&e);
    }
    state.conversations.forget(session_id);
    let traces_removed = state.traces.remove_session(session_id);
    tracing::info!(session_id, registered, traces_removed, "session deleted");

    Json(serde_json::json!({
        "deleted": true,
        "session_id": session_id,
        "registered": registered,
        "traces_removed": traces_removed,
    }))
    .into_response()
}
