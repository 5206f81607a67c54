//! `puo-assist chat`: interactive REPL.
//!
//! Each line is one turn on the current session; slash-commands inspect
//! slot memory and manage sessions.

use std::sync::Arc;

use pa_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

const CLI_USER: &str = "cli";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: Arc<Config>, session: Option<String>) -> anyhow::Result<()> {
    // 1. Boot the full runtime; chat is long-lived so background tasks run too.
    let state = bootstrap::build_app_state(config).await?;
    bootstrap::spawn_background_tasks(&state);

    let mut session_id = match session {
        Some(id) => id,
        None => new_session(&state)?,
    };

    // 2. Readline editor with history kept next to the session state.
    let history_path = state.config.sessions.state_path.join("chat_history.txt");
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("puo-assist interactive chat");
    eprintln!("Session: {session_id}  |  Type /help for commands, Ctrl+D to exit");
    eprintln!();

    // 3. REPL loop.
    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    match handle_slash_command(&state, trimmed, &mut session_id).await {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
                    }
                    continue;
                }

                ask(&state, &session_id, trimmed).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    // 4. Save history and flush sessions.
    rl.save_history(&history_path).ok();
    if let Err(e) = state.sessions.flush() {
        tracing::warn!(error = %e, "session store flush on exit failed");
    }
    eprintln!("Goodbye!");
    Ok(())
}

fn new_session(state: &AppState) -> anyhow::Result<String> {
    let entry = state
        .sessions
        .create(CLI_USER, &state.config.sessions.default_title)?;
    Ok(entry.session_id)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slash command handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns `true` if the REPL should exit.
async fn handle_slash_command(
    state: &AppState,
    input: &str,
    session_id: &mut String,
) -> anyhow::Result<bool> {
    let (cmd, arg) = match input.split_once(' ') {
        Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (input, None),
    };

    match cmd {
        "/exit" | "/quit" => return Ok(true),

        "/slots" => {
            state
                .conversations
                .load(&state.transcripts, session_id)
                .await?;
            match state.conversations.snapshot(session_id) {
                Some(memory) if !memory.is_empty() => {
                    for (slot, entry) in memory.snapshot() {
                        eprintln!(
                            "  {:<14} {:<40} (turn {})",
                            serde_json::to_string(&slot)?.trim_matches('"'),
                            entry.value.as_text(),
                            entry.turn_index
                        );
                    }
                }
                _ => eprintln!("  (no slots yet)"),
            }
        }

        "/clear" => {
            let _permit = state.session_locks.acquire(session_id).await?;
            state.transcripts.clear(session_id).await?;
            state.conversations.forget(session_id);
            eprintln!("History and slot memory cleared.");
        }

        "/session" => match arg {
            Some(id) => {
                *session_id = id.to_owned();
                eprintln!("Session switched to: {session_id}");
            }
            None => {
                eprintln!("Current session: {session_id}");
                if let Some(entry) = state.sessions.get(session_id) {
                    eprintln!("Title: {}  |  turns: {}", entry.title, entry.turns);
                }
                eprintln!("Usage: /session <id>");
            }
        },

        "/new" => {
            *session_id = new_session(state)?;
            eprintln!("New session: {session_id}");
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /slots           Show the session's slot memory");
            eprintln!("  /clear           Clear history and slot memory");
            eprintln!("  /session [id]    Show or switch the current session");
            eprintln!("  /new             Start a fresh session");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }

        other => eprintln!("Unknown command: {other}  (type /help for a list)"),
    }

    Ok(false)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// One turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn ask(state: &AppState, session_id: &str, question: &str) {
    let input = TurnInput {
        session_id: session_id.to_owned(),
        user_text: question.to_owned(),
        context_version: None,
    };

    let mut rx = run_turn(state.clone(), input);
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::ToolCall { operation, .. } => {
                eprintln!("\x1B[2m[calling {operation}]\x1B[0m");
            }
            TurnEvent::ToolResult { .. } => {}
            TurnEvent::Answer { content } => println!("{content}\n"),
            TurnEvent::Clarification { message, .. } => {
                println!("\x1B[33m{message}\x1B[0m\n");
            }
            TurnEvent::Rejected { message, .. } => println!("\x1B[33m{message}\x1B[0m\n"),
            TurnEvent::Error { message } => eprintln!("\x1B[31merror: {message}\x1B[0m"),
            TurnEvent::Done { .. } => {}
        }
    }
}
