use std::sync::Arc;

use pa_datasource::DataSource;
use pa_domain::config::Config;
use pa_routing::Extractor;
use pa_sessions::{SessionStore, TranscriptWriter};

use crate::runtime::conversations::ConversationRegistry;
use crate::runtime::session_lock::SessionLockMap;
use crate::runtime::title::TitleService;
use crate::runtime::traces::TraceStore;

/// Shared application state passed to all API handlers and CLI commands.
///
/// Fields are grouped by concern:
/// - **Core services**: config, extractor, data source
/// - **Session management**: sessions, transcripts, locks, slot memory
/// - **Runtime**: turn traces, title generation
/// - **Security**: token hashes
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub extractor: Arc<Extractor>,
    pub data_source: Arc<dyn DataSource>,

    // ── Session management ────────────────────────────────────────────
    pub sessions: Arc<SessionStore>,
    pub transcripts: Arc<TranscriptWriter>,
    pub session_locks: Arc<SessionLockMap>,
    /// Per-session slot memory, rebuilt from history on first use.
    pub conversations: Arc<ConversationRegistry>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub traces: Arc<TraceStore>,
    pub titles: Arc<TitleService>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = dev mode (admin endpoints accessible without auth).
    pub admin_token_hash: Option<Vec<u8>>,
}
