//! `puo-assist run`: one-shot question.
//!
//! Boots the runtime, runs a single turn against the given session and
//! exits. Slot memory persists in the session history, so consecutive
//! runs on the same `--session` behave like one conversation.

use std::sync::Arc;

use pa_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{process_turn, run_turn, TurnEvent, TurnInput, TurnStatus};

pub async fn run(
    config: Arc<Config>,
    message: String,
    session_id: String,
    context_version: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    // 1. Boot the full runtime (without background tasks).
    let state = bootstrap::build_app_state(config).await?;

    let input = TurnInput {
        session_id,
        user_text: message,
        context_version,
    };

    // 2. Run the turn.
    let status = if json_output {
        let outcome = process_turn(&state, input).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        outcome.status
    } else {
        let mut rx = run_turn(state.clone(), input);
        let mut status = TurnStatus::Failed;
        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::ToolCall { operation, .. } => {
                    eprintln!("\x1b[2m[calling {operation}]\x1b[0m");
                }
                TurnEvent::ToolResult {
                    operation,
                    is_error: true,
                    ..
                } => {
                    eprintln!("\x1b[2m[{operation} failed]\x1b[0m");
                }
                TurnEvent::ToolResult { .. } => {}
                TurnEvent::Answer { content }
                | TurnEvent::Clarification {
                    message: content, ..
                }
                | TurnEvent::Rejected {
                    message: content, ..
                } => println!("{content}"),
                TurnEvent::Error { message } => eprintln!("error: {message}"),
                TurnEvent::Done { status: s } => status = s,
            }
        }
        status
    };

    // 3. Flush session store before exit.
    if let Err(e) = state.sessions.flush() {
        tracing::warn!(error = %e, "session store flush on exit failed");
    }

    if status == TurnStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
