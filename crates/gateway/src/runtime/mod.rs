//! Turn runtime: ties extraction, slot memory, routing, the data service
//! and persistence into one deterministic pass per user message.
//!
//! Entry points: [`process_turn`] returns the finished [`TurnOutcome`];
//! [`run_turn`] streams [`TurnEvent`]s for SSE and the CLI.
//!
//! Per turn: `Classifying → (NeedsClarification | Rejected | Resolved →
//! Invoking → (Success | Failed))`.

pub mod answer;
pub mod conversations;
pub mod session_lock;
pub mod title;
pub mod traces;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use pa_domain::config::is_default_title;
use pa_domain::error::{Error, Result};
use pa_domain::trace::TraceEvent;
use pa_routing::{
    resolve, supplied_slots, BoundSlots, IdentifierKind, Operation, Param, RejectReason,
    Resolution, TurnContext,
};
use pa_sessions::{is_valid_session_id, Role, TranscriptLine};

use crate::state::AppState;
use traces::{StepKind, TurnTrace};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn input / outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct TurnInput {
    pub session_id: String,
    pub user_text: String,
    /// Major version the caller is working in; falls back to
    /// `routing.default_major_version`.
    pub context_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Success,
    Failed,
    NeedsClarification,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationError {
    pub kind: String,
    pub message: String,
}

/// One data-service call as recorded in history and traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub operation: String,
    pub endpoint: String,
    pub arguments: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<InvocationError>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub turn_index: u32,
    pub status: TurnStatus,
    pub answer: String,
    pub resolution: Resolution,
    pub tool_invocations: Vec<ToolInvocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent: the SSE event type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A data-service operation is about to be called.
    ToolCall {
        call_id: String,
        operation: String,
        arguments: Map<String, Value>,
    },
    ToolResult {
        call_id: String,
        operation: String,
        content: Value,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    Clarification {
        missing: Vec<Param>,
        ambiguous: Vec<String>,
        message: String,
    },
    Rejected {
        reason: RejectReason,
        message: String,
    },
    Answer {
        content: String,
    },
    Error {
        message: String,
    },
    /// Always the last event of a turn.
    Done {
        status: TurnStatus,
    },
}

impl TurnEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Clarification { .. } => "clarification",
            Self::Rejected { .. } => "rejected",
            Self::Answer { .. } => "answer",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }
}

/// Optional event sink; `process_turn` runs without one.
struct Events<'a>(Option<&'a mpsc::Sender<TurnEvent>>);

impl Events<'_> {
    async fn send(&self, event: TurnEvent) {
        if let Some(tx) = self.0 {
            // A closed receiver means the client left; the turn still
            // completes and is persisted.
            let _ = tx.send(event).await;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Entry points
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one turn to completion.
pub async fn process_turn(state: &AppState, input: TurnInput) -> Result<TurnOutcome> {
    execute(state, input, Events(None)).await
}

/// Run one turn in the background and stream its events. The stream always
/// ends with [`TurnEvent::Done`].
pub fn run_turn(state: AppState, input: TurnInput) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel::<TurnEvent>(32);

    tokio::spawn(async move {
        let status = match execute(&state, input, Events(Some(&tx))).await {
            Ok(outcome) => outcome.status,
            Err(e) => {
                tracing::error!(error = %e, "turn aborted");
                let _ = tx
                    .send(TurnEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                TurnStatus::Failed
            }
        };
        let _ = tx.send(TurnEvent::Done { status }).await;
    });

    rx
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The turn itself
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn execute(state: &AppState, input: TurnInput, events: Events<'_>) -> Result<TurnOutcome> {
    let session_id = input.session_id.as_str();
    if !is_valid_session_id(session_id) {
        return Err(Error::InvalidSessionId(session_id.to_owned()));
    }
    let _permit = state
        .session_locks
        .acquire(session_id)
        .await
        .map_err(|e| Error::Other(e.to_string()))?;

    schedule_title(state, session_id, &input.user_text);

    let memory = state
        .conversations
        .load(&state.transcripts, session_id)
        .await?;

    // ── Classify ─────────────────────────────────────────────────────
    let classify_started = Instant::now();
    let turn = state.extractor.extract(&input.user_text);
    let supplied = supplied_slots(&turn);
    for id in &turn.identifiers {
        if id.kind == IdentifierKind::NodeId && id.validation_warning().is_some() {
            TraceEvent::NodeIdWarning {
                raw: id.raw.clone(),
                length: id.raw.len(),
            }
            .emit();
        }
    }
    let classify_ms = classify_started.elapsed().as_millis() as u64;

    // ── Resolve ──────────────────────────────────────────────────────
    let context_version = input
        .context_version
        .clone()
        .or_else(|| state.config.routing.default_major_version.clone());
    // Resolve against a working copy; the session's memory only advances
    // once the turn is in history.
    let mut working = memory.lock().clone();
    let turn_index = working.next_turn_index();
    let ctx = TurnContext {
        turn_index,
        context_version: context_version.clone(),
    };
    let resolution = resolve(&turn, &mut working, &ctx);

    TraceEvent::TurnClassified {
        session_id: session_id.to_owned(),
        turn_index,
        identifiers: turn.identifiers.len(),
        entities: turn.components.len() + turn.products.len(),
        ambiguous: turn.ambiguous.len(),
    }
    .emit();
    TraceEvent::TurnResolved {
        session_id: session_id.to_owned(),
        turn_index,
        outcome: resolution.outcome().into(),
        operation: resolution.operation().map(|op| op.name().to_owned()),
    }
    .emit();

    let mut trace = TurnTrace::new(session_id, turn_index, &input.user_text);
    trace.push(
        StepKind::Classify,
        "extract",
        serde_json::to_value(&turn)?,
        Some(classify_ms),
        false,
    );
    trace.push(
        StepKind::Resolve,
        resolution.outcome(),
        serde_json::to_value(&resolution)?,
        None,
        false,
    );

    // ── Invoke / answer ──────────────────────────────────────────────
    let mut invocations = Vec::new();
    let (status, answer) = match &resolution {
        Resolution::Resolved { operation, bound } => {
            let (invocation, failure) = invoke(state, *operation, bound, &events).await;
            trace.push(
                StepKind::Invoke,
                operation.name(),
                serde_json::to_value(&invocation)?,
                Some(invocation.duration_ms),
                failure.is_some(),
            );
            let outcome = match failure {
                None => {
                    let null = Value::Null;
                    let value = invocation.result.as_ref().unwrap_or(&null);
                    let text = answer::success(operation.descriptor(), bound, value);
                    events.send(TurnEvent::Answer { content: text.clone() }).await;
                    (TurnStatus::Success, text)
                }
                Some(err) => {
                    let text = answer::failure(&err);
                    events.send(TurnEvent::Error { message: text.clone() }).await;
                    (TurnStatus::Failed, text)
                }
            };
            invocations.push(invocation);
            outcome
        }
        Resolution::NeedsClarification {
            missing, ambiguous, ..
        } => {
            let text = answer::clarification(missing, ambiguous);
            events
                .send(TurnEvent::Clarification {
                    missing: missing.clone(),
                    ambiguous: ambiguous.clone(),
                    message: text.clone(),
                })
                .await;
            (TurnStatus::NeedsClarification, text)
        }
        Resolution::Rejected { reason } => {
            let text = answer::rejection(reason);
            events
                .send(TurnEvent::Rejected {
                    reason: reason.clone(),
                    message: text.clone(),
                })
                .await;
            (TurnStatus::Rejected, text)
        }
    };
    trace.push(
        StepKind::Answer,
        "answer",
        json!({ "status": status, "content": answer }),
        None,
        status == TurnStatus::Failed,
    );
    trace.finish(status);

    // ── Persist ──────────────────────────────────────────────────────
    let mut lines = vec![TranscriptLine::new(Role::User, &input.user_text).with_metadata(json!({
        "turn_index": turn_index,
        "supplied": supplied,
        "context_version": context_version,
        "warnings": turn.warnings,
    }))];
    for invocation in &invocations {
        lines.push(
            TranscriptLine::new(Role::Tool, &invocation.operation)
                .with_metadata(serde_json::to_value(invocation)?),
        );
    }
    lines.push(
        TranscriptLine::new(Role::Assistant, &answer).with_metadata(json!({
            "turn_index": turn_index,
            "status": status,
            "resolution": resolution,
        })),
    );
    state.transcripts.append(session_id, &lines).await?;
    *memory.lock() = working;
    state.sessions.record_turn(session_id);
    state.traces.record(trace);

    tracing::info!(
        session_id,
        turn_index,
        status = ?status,
        operation = resolution.operation().map(|op| op.name()),
        "turn finished"
    );

    Ok(TurnOutcome {
        session_id: session_id.to_owned(),
        turn_index,
        status,
        answer,
        resolution,
        tool_invocations: invocations,
        warnings: turn.warnings,
    })
}

/// Call the data service for a resolved operation. Returns the invocation
/// record and, on failure, the typed error.
async fn invoke(
    state: &AppState,
    operation: Operation,
    bound: &BoundSlots,
    events: &Events<'_>,
) -> (ToolInvocation, Option<Error>) {
    let descriptor = operation.descriptor();
    let call_id = uuid::Uuid::new_v4().to_string();
    let mut invocation = ToolInvocation {
        call_id: call_id.clone(),
        operation: descriptor.name.to_owned(),
        endpoint: descriptor.endpoint.to_owned(),
        arguments: Map::new(),
        result: None,
        error: None,
        duration_ms: 0,
    };

    let arguments = match descriptor.payload(bound) {
        Ok(a) => a,
        Err(param) => {
            let err = Error::Other(format!(
                "{} resolved without {}",
                descriptor.name,
                param.as_str()
            ));
            invocation.error = Some(InvocationError {
                kind: "missing_parameter".into(),
                message: err.to_string(),
            });
            return (invocation, Some(err));
        }
    };
    invocation.arguments = arguments.clone();

    events
        .send(TurnEvent::ToolCall {
            call_id: call_id.clone(),
            operation: descriptor.name.to_owned(),
            arguments,
        })
        .await;

    let started = Instant::now();
    let result = state.data_source.invoke(descriptor, bound).await;
    invocation.duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(value) => {
            events
                .send(TurnEvent::ToolResult {
                    call_id,
                    operation: descriptor.name.to_owned(),
                    content: value.clone(),
                    is_error: false,
                })
                .await;
            invocation.result = Some(value);
            (invocation, None)
        }
        Err(e) => {
            tracing::warn!(
                operation = descriptor.name,
                data_source = state.data_source.name(),
                kind = e.kind(),
                error = %e,
                "data-service invocation failed"
            );
            let error = InvocationError {
                kind: e.kind().to_owned(),
                message: e.to_string(),
            };
            events
                .send(TurnEvent::ToolResult {
                    call_id,
                    operation: descriptor.name.to_owned(),
                    content: json!({ "error": error.kind, "message": error.message }),
                    is_error: true,
                })
                .await;
            invocation.error = Some(error);
            (invocation, Some(e))
        }
    }
}

/// Name a still-untitled session after this question, in the background.
fn schedule_title(state: &AppState, session_id: &str, user_text: &str) {
    let Some(entry) = state.sessions.get(session_id) else {
        return;
    };
    if !is_default_title(&entry.title) || user_text.trim().is_empty() {
        return;
    }
    state.titles.schedule(
        state.sessions.clone(),
        session_id.to_owned(),
        user_text.to_owned(),
    );
}
