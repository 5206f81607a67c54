use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM (session title generation only)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// OpenAI-compatible chat completion endpoint used to name sessions.
/// When the API key env var is unset, titles fall back to a truncation
/// of the first question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_max_title_chars")]
    pub max_title_chars: usize,
    /// Title tasks allowed to run at once; extra tasks wait for a slot.
    #[serde(default = "d_max_concurrent_titles")]
    pub max_concurrent_titles: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            api_key_env: d_api_key_env(),
            timeout_ms: d_timeout_ms(),
            max_title_chars: d_max_title_chars(),
            max_concurrent_titles: d_max_concurrent_titles(),
        }
    }
}

fn d_base_url() -> String {
    "https://api.deepseek.com".into()
}
fn d_model() -> String {
    "deepseek-chat".into()
}
fn d_api_key_env() -> String {
    "DEEPSEEK_API_KEY".into()
}
fn d_timeout_ms() -> u64 {
    15_000
}
fn d_max_title_chars() -> usize {
    10
}
fn d_max_concurrent_titles() -> usize {
    4
}
