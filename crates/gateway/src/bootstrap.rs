//! AppState construction and background-task spawning.
//!
//! `serve`, `run` and `chat` share [`build_app_state`] so they boot the same
//! runtime; only `serve` and `chat` spawn the background loops.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use pa_datasource::{create_data_source, DataSource};
use pa_domain::config::{Config, ConfigSeverity};
use pa_routing::{Classifier, Extractor};
use pa_sessions::{SessionStore, TranscriptWriter};

use crate::runtime::conversations::ConversationRegistry;
use crate::runtime::session_lock::SessionLockMap;
use crate::runtime::title::TitleService;
use crate::runtime::traces::TraceStore;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`] backed by the configured data service.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let data_source = create_data_source(&config.data_service).context("creating data source")?;
    build_app_state_with(config, data_source).await
}

/// Same as [`build_app_state`] with an explicit data source.
pub async fn build_app_state_with(
    config: Arc<Config>,
    data_source: Arc<dyn DataSource>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }

    // ── Extraction ───────────────────────────────────────────────────
    let classifier = Classifier::new(config.routing.node_id_min_len);
    let extractor = Arc::new(Extractor::new(classifier).context("compiling extraction patterns")?);
    tracing::info!(
        node_id_min_len = config.routing.node_id_min_len,
        default_major_version = ?config.routing.default_major_version,
        "extractor ready"
    );

    // ── Session management ───────────────────────────────────────────
    let state_path = &config.sessions.state_path;
    let sessions = Arc::new(SessionStore::new(state_path).context("initializing session store")?);
    let transcripts = Arc::new(TranscriptWriter::new(&sessions.transcript_dir()));
    let session_locks = Arc::new(SessionLockMap::new());
    let conversations = Arc::new(ConversationRegistry::new());
    tracing::info!(path = %state_path.display(), "session management ready");

    // ── Traces & titles ──────────────────────────────────────────────
    let traces = Arc::new(TraceStore::new(state_path, config.sessions.trace_capacity));
    let titles = Arc::new(TitleService::from_config(&config.llm).context("initializing title generation")?);
    tracing::info!(
        data_source = data_source.name(),
        traces = traces.len(),
        "runtime ready"
    );

    // ── Tokens (read once, hashed for constant-time comparison) ──────
    let api_token_hash = token_hash(&config.server.api_token_env, "API");
    let admin_token_hash = token_hash(&config.admin.token_env, "admin");

    Ok(AppState {
        config,
        extractor,
        data_source,
        sessions,
        transcripts,
        session_locks,
        conversations,
        traces,
        titles,
        api_token_hash,
        admin_token_hash,
    })
}

fn token_hash(env_var: &str, label: &str) -> Option<Vec<u8>> {
    match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(env = %env_var, "{label} bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        None => {
            tracing::warn!("{label} bearer-token auth DISABLED; set {env_var} to enable it");
            None
        }
    }
}

/// Spawn the periodic session flush and idle-session eviction.
pub fn spawn_background_tasks(state: &AppState) {
    {
        let sessions = state.sessions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.flush() {
                    tracing::warn!(error = %e, "session store flush failed");
                }
            }
        });
    }

    {
        let session_locks = state.session_locks.clone();
        let conversations = state.conversations.clone();
        let transcripts = state.transcripts.clone();
        let max_idle = std::time::Duration::from_secs(state.config.sessions.idle_evict_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                session_locks.prune_idle();
                let memories = conversations.prune_idle(max_idle);
                let histories = transcripts.evict_idle(max_idle);
                if memories + histories > 0 {
                    tracing::debug!(memories, histories, "evicted idle sessions");
                }
            }
        });
    }
    tracing::info!("background tasks spawned");
}
