//! Conversation history endpoints.
//!
//! History is what the chat UI renders: user questions and assistant
//! answers. Tool lines stay in the transcript for the ops trace view.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use pa_sessions::{Role, TranscriptLine};

use crate::state::AppState;

use super::sessions::SessionIdBody;
use super::{api_error, domain_error, require_session_id};

#[derive(Debug, Serialize)]
pub struct HistoryMessage {
    /// `user` or `ai`.
    pub role: &'static str,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HistoryMessage {
    fn from_line(line: &TranscriptLine) -> Option<Self> {
        let role = match line.role {
            Role::User => "user",
            Role::Assistant => "ai",
            Role::Tool => return None,
        };
        Some(Self {
            role,
            content: line.content.clone(),
            timestamp: line.timestamp,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /api/history?session_id=
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: String,
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let session_id = match require_session_id(&query.session_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.transcripts.read(session_id).await {
        Ok(lines) => {
            let messages: Vec<HistoryMessage> =
                lines.iter().filter_map(HistoryMessage::from_line).collect();
            Json(serde_json::json!({
                "session_id": session_id,
                "messages": messages,
            }))
            .into_response()
        }
        Err(e) => domain_error(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/history/clear
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Clear history and slot memory; the session itself stays.
pub async fn clear_history(
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

    if let Err(e) = state.transcripts.clear(session_id).await {
        return domain_error(&e);
    }
    state.conversations.forget(session_id);
    tracing::info!(session_id, "history cleared");

    Json(serde_json::json!({
        "cleared": true,
        "session_id": session_id,
    }))
    .into_response()
}
