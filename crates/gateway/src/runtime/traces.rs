//! Turn traces: a step-by-step record of how every turn was handled.
//!
//! Each turn produces a [`TurnTrace`] holding its steps (extraction,
//! resolution, data-service invocation, answer). Traces are appended to a
//! JSONL file and kept in a bounded in-memory ring for the ops endpoints.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TurnStatus;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trace step
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Classify,
    Resolve,
    Invoke,
    Answer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: u32,
    pub kind: StepKind,
    pub name: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub detail: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn trace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTrace {
    pub trace_id: Uuid,
    pub session_id: String,
    pub turn_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TurnStatus>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// First ~200 chars of the user text.
    pub input_preview: String,
    pub steps: Vec<TraceStep>,
}

impl TurnTrace {
    pub fn new(session_id: &str, turn_index: u32, user_text: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            session_id: session_id.to_owned(),
            turn_index,
            status: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_preview: truncate(user_text, 200),
            steps: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        kind: StepKind,
        name: impl Into<String>,
        detail: serde_json::Value,
        duration_ms: Option<u64>,
        is_error: bool,
    ) {
        self.steps.push(TraceStep {
            step: self.steps.len() as u32 + 1,
            kind,
            name: name.into(),
            at: Utc::now(),
            duration_ms,
            detail,
            is_error,
        });
    }

    pub fn finish(&mut self, status: TurnStatus) {
        let now = Utc::now();
        self.status = Some(status);
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trace store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TraceStore {
    /// Bounded ring of recent traces, newest last.
    traces: RwLock<VecDeque<TurnTrace>>,
    capacity: usize,
    log_path: PathBuf,
}

impl TraceStore {
    /// Open the store at `state_path/traces/traces.jsonl`, loading the most
    /// recent `capacity` traces.
    pub fn new(state_path: &Path, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let dir = state_path.join("traces");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), error = %e, "failed to create trace dir");
        }

        let log_path = dir.join("traces.jsonl");
        let (traces, total_on_disk) = load_recent(&log_path, capacity);
        if total_on_disk > traces.len() {
            tracing::info!(
                kept = traces.len(),
                pruned = total_on_disk - traces.len(),
                "pruning trace log on disk"
            );
            rewrite_jsonl(&log_path, &traces);
        }

        Self {
            traces: RwLock::new(traces),
            capacity,
            log_path,
        }
    }

    /// Keep a finished trace and append it to the log.
    pub fn record(&self, trace: TurnTrace) {
        self.persist(&trace);
        let mut traces = self.traces.write();
        traces.push_back(trace);
        while traces.len() > self.capacity {
            traces.pop_front();
        }
    }

    fn persist(&self, trace: &TurnTrace) {
        let json = match serde_json::to_string(trace) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize turn trace");
                return;
            }
        };
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut file| writeln!(file, "{json}"));
        if let Err(e) = written {
            tracing::warn!(path = %self.log_path.display(), error = %e, "failed to append turn trace");
        }
    }

    /// A session's traces, oldest first.
    pub fn for_session(&self, session_id: &str) -> Vec<TurnTrace> {
        self.traces
            .read()
            .iter()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Drop every trace of a session, in memory and on disk.
    pub fn remove_session(&self, session_id: &str) -> usize {
        let mut traces = self.traces.write();
        let before = traces.len();
        traces.retain(|t| t.session_id != session_id);
        let removed = before - traces.len();
        if removed > 0 {
            rewrite_jsonl(&self.log_path, &traces);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.traces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.read().is_empty()
    }
}

/// The last `capacity` traces plus the number of lines on disk.
fn load_recent(path: &Path, capacity: usize) -> (VecDeque<TurnTrace>, usize) {
    let mut traces = VecDeque::new();
    let Ok(content) = std::fs::read_to_string(path) else {
        return (traces, 0);
    };
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    for line in lines.iter().rev().take(capacity) {
        if let Ok(trace) = serde_json::from_str::<TurnTrace>(line) {
            traces.push_front(trace);
        }
    }
    (traces, lines.len())
}

fn rewrite_jsonl(path: &Path, traces: &VecDeque<TurnTrace>) {
    let tmp = path.with_extension("jsonl.tmp");
    let result = std::fs::File::create(&tmp).and_then(|mut f| {
        for trace in traces {
            let json = serde_json::to_string(trace).map_err(std::io::Error::other)?;
            writeln!(f, "{json}")?;
        }
        Ok(())
    });
    match result {
        Ok(()) => {
            if let Err(e) = std::fs::rename(&tmp, path) {
                tracing::warn!(error = %e, "failed to replace trace log");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to rewrite trace log");
            let _ = std::fs::remove_file(&tmp);
        }
    }
}

/// Truncate on a char boundary, appending `…` when shortened.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finished(session_id: &str, turn_index: u32) -> TurnTrace {
        let mut trace = TurnTrace::new(session_id, turn_index, "branch foo/bar iware");
        trace.push(StepKind::Classify, "extract", json!({}), None, false);
        trace.push(StepKind::Resolve, "resolve", json!({"outcome": "resolved"}), None, false);
        trace.finish(TurnStatus::Success);
        trace
    }

    #[test]
    fn steps_are_numbered_in_order() {
        let trace = finished("s1", 0);
        let numbers: Vec<_> = trace.steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(trace.status, Some(TurnStatus::Success));
        assert!(trace.duration_ms.is_some());
    }

    #[test]
    fn persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TraceStore::new(dir.path(), 10);
            store.record(finished("s1", 0));
            store.record(finished("s2", 0));
            store.record(finished("s1", 1));
        }
        let store = TraceStore::new(dir.path(), 10);
        let s1 = store.for_session("s1");
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[1].turn_index, 1);
    }

    #[test]
    fn ring_is_bounded_and_disk_is_pruned() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TraceStore::new(dir.path(), 3);
            for i in 0..5 {
                store.record(finished("s1", i));
            }
            assert_eq!(store.len(), 3);
        }
        let store = TraceStore::new(dir.path(), 3);
        let turns: Vec<_> = store.for_session("s1").iter().map(|t| t.turn_index).collect();
        assert_eq!(turns, vec![2, 3, 4]);

        let on_disk = std::fs::read_to_string(dir.path().join("traces/traces.jsonl")).unwrap();
        assert_eq!(on_disk.lines().count(), 3);
    }

    #[test]
    fn remove_session_rewrites_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = TraceStore::new(dir.path(), 10);
        store.record(finished("s1", 0));
        store.record(finished("s2", 0));
        assert_eq!(store.remove_session("s1"), 1);

        let reloaded = TraceStore::new(dir.path(), 10);
        assert!(reloaded.for_session("s1").is_empty());
        assert_eq!(reloaded.for_session("s2").len(), 1);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("短问题", 10), "短问题");
        assert_eq!(truncate("组件版本查询结果", 4), "组件版本…");
    }
}
