use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions, history & traces
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Titles that mark a session as still unnamed. A chat turn on such a
/// session schedules background title generation.
pub const DEFAULT_TITLES: &[&str] = &["New Chat", "新对话", "未命名会话"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory for sessions, transcripts and turn traces.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Title given to new sessions when the caller does not supply one.
    #[serde(default = "d_default_title")]
    pub default_title: String,
    /// Turn traces kept in memory (oldest evicted first).
    #[serde(default = "d_trace_capacity")]
    pub trace_capacity: usize,
    /// Slot memory and cached history of a session are dropped after this
    /// many seconds without a turn; both are rebuilt from disk on demand.
    #[serde(default = "d_idle_evict_secs")]
    pub idle_evict_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            default_title: d_default_title(),
            trace_capacity: d_trace_capacity(),
            idle_evict_secs: d_idle_evict_secs(),
        }
    }
}

/// Whether `title` is a placeholder that title generation may replace.
pub fn is_default_title(title: &str) -> bool {
    DEFAULT_TITLES.contains(&title)
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data/state")
}
fn d_default_title() -> String {
    "New Chat".into()
}
fn d_trace_capacity() -> usize {
    1000
}
fn d_idle_evict_secs() -> u64 {
    1800
}
