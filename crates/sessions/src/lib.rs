//! Session management for puo-assist: the session catalogue (owner, title,
//! timestamps) and the append-only conversation history behind it.

pub mod store;
pub mod transcript;

pub use store::{SessionEntry, SessionPage, SessionStore};
pub use transcript::{is_valid_session_id, Role, TranscriptLine, TranscriptWriter};
