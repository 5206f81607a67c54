//! Append-only JSONL conversation history.
//!
//! Each session gets a `<sessionId>.jsonl` file under the sessions
//! directory. User questions, tool invocations and assistant answers are
//! appended as single JSON lines. An in-memory write-through cache keeps
//! reads off the disk after the first load; file I/O runs on the blocking
//! pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pa_domain::error::{Error, Result};
use pa_domain::trace::TraceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Tool,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TranscriptLine {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

struct CachedHistory {
    lines: Vec<TranscriptLine>,
    last_used: Instant,
}

pub struct TranscriptWriter {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, CachedHistory>>,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn path(&self, session_id: &str) -> Result<PathBuf> {
        if !is_valid_session_id(session_id) {
            return Err(Error::InvalidSessionId(session_id.to_owned()));
        }
        Ok(self.base_dir.join(format!("{session_id}.jsonl")))
    }

    /// Append lines to a session's history. Disk first; the cache is only
    /// updated once the write succeeded.
    pub async fn append(&self, session_id: &str, lines: &[TranscriptLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let path = self.path(session_id)?;
        let buf = serialize_lines(lines)?;
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(buf.as_bytes())?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        // Only extend an already-loaded cache entry; an unloaded session is
        // read from disk in full on first access.
        if let Some(cached) = self.cache.write().get_mut(session_id) {
            cached.lines.extend(lines.iter().cloned());
            cached.last_used = Instant::now();
        }

        TraceEvent::TranscriptAppend {
            session_id: session_id.to_owned(),
            lines: lines.len(),
        }
        .emit();
        Ok(())
    }

    /// The full history of a session, oldest first. Empty when the session
    /// has no history yet.
    pub async fn read(&self, session_id: &str) -> Result<Vec<TranscriptLine>> {
        let path = self.path(session_id)?;
        if let Some(cached) = self.cache.write().get_mut(session_id) {
            cached.last_used = Instant::now();
            return Ok(cached.lines.clone());
        }

        let sid = session_id.to_owned();
        let lines = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache.write().insert(
            session_id.to_owned(),
            CachedHistory {
                lines: lines.clone(),
                last_used: Instant::now(),
            },
        );
        Ok(lines)
    }

    /// Drop cached histories not read or appended to within `max_idle`.
    /// The files stay; the next read loads them again.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|_, cached| cached.last_used.elapsed() < max_idle);
        before - cache.len()
    }

    pub fn cached_sessions(&self) -> usize {
        self.cache.read().len()
    }

    /// Drop a session's history from disk and cache.
    pub async fn clear(&self, session_id: &str) -> Result<()> {
        let path = self.path(session_id)?;
        self.cache.write().remove(session_id);
        tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(Error::Io(e)),
            _ => Ok(()),
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }
}

/// Session ids become file names: 1 to 128 ASCII letters, digits, `-` or
/// `_`. Generated ids are UUIDs and always pass.
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn serialize_lines(lines: &[TranscriptLine]) -> Result<String> {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(&serde_json::to_string(line)?);
        buf.push('\n');
    }
    Ok(buf)
}

fn read_jsonl_file(path: &Path, session_id: &str) -> Result<Vec<TranscriptLine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<TranscriptLine>(line) {
            Ok(tl) => lines.push(tl),
            Err(e) => {
                tracing::warn!(
                    session_id = session_id,
                    error = %e,
                    "skipping malformed transcript line"
                );
            }
        }
    }
    Ok(lines)
}
