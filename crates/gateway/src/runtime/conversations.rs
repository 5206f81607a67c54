//! Registry of live slot memories, one per session.
//!
//! Memory is not persisted on its own. The first turn of a session after a
//! restart replays the supplied-slot records stored on the user lines of
//! the conversation history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;

use pa_domain::error::Result;
use pa_domain::trace::TraceEvent;
use pa_routing::{SlotMemory, SuppliedSlots};
use pa_sessions::{Role, TranscriptLine, TranscriptWriter};

pub type SharedMemory = Arc<Mutex<SlotMemory>>;

/// Metadata recorded on every user line of the history.
#[derive(Debug, Deserialize)]
struct UserTurnRecord {
    turn_index: u32,
    #[serde(default)]
    supplied: SuppliedSlots,
}

struct LiveMemory {
    memory: SharedMemory,
    last_used: Instant,
}

#[derive(Default)]
pub struct ConversationRegistry {
    memories: Mutex<HashMap<String, LiveMemory>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session's memory, rebuilt from history when not yet loaded.
    pub async fn load(&self, transcripts: &TranscriptWriter, session_id: &str) -> Result<SharedMemory> {
        if let Some(live) = self.memories.lock().get_mut(session_id) {
            live.last_used = Instant::now();
            return Ok(live.memory.clone());
        }

        let lines = transcripts.read(session_id).await?;
        let (memory, turns_replayed) = replay(&lines);
        if turns_replayed > 0 {
            TraceEvent::SlotMemoryRebuilt {
                session_id: session_id.to_owned(),
                turns_replayed,
            }
            .emit();
        }

        let live = LiveMemory {
            memory: Arc::new(Mutex::new(memory)),
            last_used: Instant::now(),
        };
        Ok(self
            .memories
            .lock()
            .entry(session_id.to_owned())
            .or_insert(live)
            .memory
            .clone())
    }

    /// Current memory contents, if the session is loaded.
    pub fn snapshot(&self, session_id: &str) -> Option<SlotMemory> {
        self.memories
            .lock()
            .get(session_id)
            .map(|live| live.memory.lock().clone())
    }

    /// Destroy a session's memory (history cleared or session deleted).
    pub fn forget(&self, session_id: &str) {
        self.memories.lock().remove(session_id);
    }

    /// Drop memories untouched for `max_idle` that no turn is using. They
    /// are rebuilt from history on the next turn. Returns how many went.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut memories = self.memories.lock();
        let before = memories.len();
        memories.retain(|_, live| {
            Arc::strong_count(&live.memory) > 1 || live.last_used.elapsed() < max_idle
        });
        before - memories.len()
    }

    pub fn len(&self) -> usize {
        self.memories.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.lock().is_empty()
    }
}

fn replay(lines: &[TranscriptLine]) -> (SlotMemory, usize) {
    let mut memory = SlotMemory::new();
    let mut replayed = 0;
    for line in lines.iter().filter(|l| l.role == Role::User) {
        let Some(meta) = &line.metadata else { continue };
        match UserTurnRecord::deserialize(meta) {
            Ok(record) => {
                memory.apply(record.turn_index, &record.supplied);
                replayed += 1;
            }
            Err(e) => tracing::warn!(error = %e, "skipping unreadable turn record"),
        }
    }
    (memory, replayed)
}
