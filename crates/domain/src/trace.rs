use serde::Serialize;

/// Structured trace events emitted across all puo-assist crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TurnClassified {
        session_id: String,
        turn_index: u32,
        identifiers: usize,
        entities: usize,
        ambiguous: usize,
    },
    TurnResolved {
        session_id: String,
        turn_index: u32,
        outcome: String,
        operation: Option<String>,
    },
    DataServiceCall {
        endpoint: String,
        attempt: u32,
        status: u16,
        duration_ms: u64,
    },
    NodeIdWarning {
        raw: String,
        length: usize,
    },
    SessionCreated {
        session_id: String,
        user_id: String,
    },
    SessionDeleted {
        session_id: String,
    },
    SlotMemoryRebuilt {
        session_id: String,
        turns_replayed: usize,
    },
    TranscriptAppend {
        session_id: String,
        lines: usize,
    },
    TitleGenerated {
        session_id: String,
        generator: String,
        duration_ms: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "pa_event");
    }
}
