//! Session store.
//!
//! Persists conversation sessions in `sessions.json` under the configured
//! state path. Each entry records who owns the session, its title and when
//! it was created and last used. Mutations write through to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pa_domain::config::is_default_title;
use pa_domain::error::{Error, Result};
use pa_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub turns: u64,
}

/// One page of a filtered session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPage {
    pub items: Vec<SessionEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    sessions_path: PathBuf,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Load or create the store at `state_path/sessions/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir)?;

        let sessions_path = dir.join("sessions.json");
        let sessions = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "unreadable sessions.json, starting empty");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path,
            sessions: RwLock::new(sessions),
        })
    }

    pub fn create(&self, user_id: &str, title: &str) -> Result<SessionEntry> {
        let now = Utc::now();
        let entry = SessionEntry {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            title: title.to_owned(),
            created_at: now,
            updated_at: now,
            turns: 0,
        };
        self.sessions
            .write()
            .insert(entry.session_id.clone(), entry.clone());
        self.flush()?;

        TraceEvent::SessionCreated {
            session_id: entry.session_id.clone(),
            user_id: entry.user_id.clone(),
        }
        .emit();
        Ok(entry)
    }

    pub fn get(&self, session_id: &str) -> Option<SessionEntry> {
        self.sessions.read().get(session_id).cloned()
    }

    /// A user's sessions, newest first.
    pub fn list_for_user(&self, user_id: &str) -> Vec<SessionEntry> {
        let mut list: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sort_newest_first(&mut list);
        list
    }

    /// All sessions whose user id contains `user_filter`, newest first,
    /// paginated (1-based `page`).
    pub fn query(&self, user_filter: Option<&str>, page: usize, page_size: usize) -> SessionPage {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let mut list: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|s| user_filter.map_or(true, |f| s.user_id.contains(f)))
            .cloned()
            .collect();
        sort_newest_first(&mut list);
        let total = list.len();
        let items = list
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        SessionPage {
            items,
            total,
            page,
            page_size,
        }
    }

    pub fn rename(&self, session_id: &str, title: &str) -> Result<SessionEntry> {
        let entry = {
            let mut sessions = self.sessions.write();
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
            entry.title = title.to_owned();
            entry.updated_at = Utc::now();
            entry.clone()
        };
        self.flush()?;
        Ok(entry)
    }

    /// Replace the title only if it is still a placeholder, so a generated
    /// title never overwrites a manual rename. Returns whether it changed.
    pub fn set_generated_title(&self, session_id: &str, title: &str) -> Result<bool> {
        let changed = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(session_id) {
                Some(entry) if is_default_title(&entry.title) => {
                    entry.title = title.to_owned();
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.flush()?;
        }
        Ok(changed)
    }

    /// Count a turn and bump `updated_at`.
    pub fn record_turn(&self, session_id: &str) {
        if let Some(entry) = self.sessions.write().get_mut(session_id) {
            entry.turns += 1;
            entry.updated_at = Utc::now();
        }
    }

    pub fn delete(&self, session_id: &str) -> Result<SessionEntry> {
        let removed = self
            .sessions
            .write()
            .remove(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_owned()))?;
        self.flush()?;

        TraceEvent::SessionDeleted {
            session_id: session_id.to_owned(),
        }
        .emit();
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Persist the current session state to disk.
    pub fn flush(&self) -> Result<()> {
        let json = {
            let sessions = self.sessions.read();
            serde_json::to_string_pretty(&*sessions)?
        };
        let tmp = self.sessions_path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.sessions_path)?;
        Ok(())
    }

    /// Directory holding the per-session transcript files.
    pub fn transcript_dir(&self) -> PathBuf {
        self.sessions_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
    }
}

fn sort_newest_first(list: &mut [SessionEntry]) {
    list.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
}
