//! Operator views: every session across users, and the full trace of one
//! session (history including tool calls, plus the per-turn step traces).
//!
//! All endpoints require [`AdminGuard`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pa_sessions::{Role, TranscriptLine};

use crate::state::AppState;

use super::guard::AdminGuard;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 200;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /ops/sessions?user_id=&page=&page_size=
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct OpsSessionsQuery {
    /// Substring match on the user id.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

pub async fn list_sessions(
    _guard: AdminGuard,
    State(state): State<AppState>,
    Query(query): Query<OpsSessionsQuery>,
) -> impl IntoResponse {
    let filter = query
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = state
        .sessions
        .query(filter, query.page.unwrap_or(1), page_size);

    Json(serde_json::json!({
        "code": 200,
        "data": {
            "list": page.items,
            "total": page.total,
            "page": page.page,
            "page_size": page.page_size,
        }
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /ops/sessions/:session_id/trace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One history line as rendered in the trace view.
#[derive(Debug, Serialize)]
pub struct TraceEntry {
    /// `human`, `tool` or `ai`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// `success` or `error`, tool lines only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl From<&TranscriptLine> for TraceEntry {
    fn from(line: &TranscriptLine) -> Self {
        let kind = match line.role {
            Role::User => "human",
            Role::Tool => "tool",
            Role::Assistant => "ai",
        };
        let (tool_call_id, status) = match (line.role, &line.metadata) {
            (Role::Tool, Some(meta)) => (
                meta.get("call_id").and_then(Value::as_str).map(str::to_owned),
                Some(if meta.get("error").is_some() { "error" } else { "success" }),
            ),
            _ => (None, None),
        };
        Self {
            kind,
            content: line.content.clone(),
            timestamp: line.timestamp,
            tool_call_id,
            status,
            metadata: line.metadata.clone(),
        }
    }
}

pub async fn session_trace(
    _guard: AdminGuard,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    if !pa_sessions::is_valid_session_id(&session_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "code": 400,
                "msg": format!("invalid session id {session_id:?}"),
                "trace": [],
            })),
        )
            .into_response();
    }
    let lines = match state.transcripts.read(&session_id).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "failed to read history");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "code": 500, "msg": e.to_string() })),
            )
                .into_response();
        }
    };
    if lines.is_empty() && state.sessions.get(&session_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "code": 404,
                "msg": format!("no history for session {session_id}"),
                "trace": [],
            })),
        )
            .into_response();
    }

    let trace: Vec<TraceEntry> = lines.iter().map(TraceEntry::from).collect();
    Json(serde_json::json!({
        "code": 200,
        "session_id": session_id,
        "step_count": trace.len(),
        "trace": trace,
        "turns": state.traces.for_session(&session_id),
        "slots": state.conversations.snapshot(&session_id),
    }))
    .into_response()
}
