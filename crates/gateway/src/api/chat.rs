//! Chat endpoints: the primary interface for running turns.
//!
//! - `POST /api/chat`     : SSE: streams tool activity, then the answer
//! - `POST /api/chat/sync`: the finished `TurnOutcome` as JSON

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;

use crate::runtime::{process_turn, run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

use super::{domain_error, require, require_session_id};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// User question.
    pub query: String,
    pub session_id: String,
    /// Major version the user is working in, e.g. `"24a"`.
    #[serde(default)]
    pub context_version: Option<String>,
}

impl ChatRequest {
    fn into_input(self) -> Result<TurnInput, Response> {
        require("query", &self.query)?;
        let session_id = require_session_id(&self.session_id)?.to_owned();
        Ok(TurnInput {
            session_id,
            user_text: self.query,
            context_version: self.context_version.filter(|v| !v.trim().is_empty()),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/chat (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let input = match body.into_input() {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    if state.sessions.get(&input.session_id).is_none() {
        tracing::debug!(session_id = %input.session_id, "chat on an unregistered session");
    }

    let rx = run_turn(state, input);
    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn make_sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = match serde_json::to_string(&event) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(error = %e, event = event.name(), "failed to serialize turn event");
                    serde_json::json!({ "type": "error", "message": e.to_string() }).to_string()
                }
            };
            yield Ok(Event::default().event(event.name()).data(data));
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /api/chat/sync
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_sync(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    let input = match body.into_input() {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match process_turn(&state, input).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => domain_error(&e),
    }
}
