//! Conversation Slot Memory.
//!
//! One instance per session. Each slot holds the last value a turn supplied
//! plus the index of that turn; a later turn overwrites, never merges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{Entity, EntityKind};
use crate::identifier::Identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    MajorVersion,
    SearchKey,
    Component,
    Product,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Identifier(Identifier),
    Text(String),
}

impl SlotValue {
    pub fn as_text(&self) -> &str {
        match self {
            Self::Identifier(id) => &id.raw,
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub value: SlotValue,
    pub turn_index: u32,
}

/// The slots one turn supplied, as recorded in the conversation history so
/// memory can be replayed after a restart.
pub type SuppliedSlots = BTreeMap<Slot, SlotValue>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotMemory {
    slots: BTreeMap<Slot, SlotEntry>,
    /// Highest turn index applied so far.
    #[serde(default)]
    last_turn: Option<u32>,
}

impl SlotMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional overwrite.
    pub fn update(&mut self, slot: Slot, value: SlotValue, turn_index: u32) {
        self.slots.insert(slot, SlotEntry { value, turn_index });
        self.last_turn = Some(self.last_turn.map_or(turn_index, |t| t.max(turn_index)));
    }

    pub fn resolve(&self, slot: Slot) -> Option<&SlotValue> {
        self.slots.get(&slot).map(|e| &e.value)
    }

    pub fn entry(&self, slot: Slot) -> Option<&SlotEntry> {
        self.slots.get(&slot)
    }

    pub fn major_version(&self) -> Option<&str> {
        self.resolve(Slot::MajorVersion).map(SlotValue::as_text)
    }

    pub fn search_key(&self) -> Option<&Identifier> {
        match self.resolve(Slot::SearchKey)? {
            SlotValue::Identifier(id) => Some(id),
            SlotValue::Text(_) => None,
        }
    }

    /// Whichever of component/product was supplied most recently.
    /// `None` when neither is set, or when both were set by the same turn.
    pub fn latest_entity(&self) -> Option<Entity> {
        let component = self.entry(Slot::Component);
        let product = self.entry(Slot::Product);
        let (kind, entry) = match (component, product) {
            (Some(c), Some(p)) if c.turn_index == p.turn_index => return None,
            (Some(c), Some(p)) if c.turn_index > p.turn_index => (EntityKind::Component, c),
            (_, Some(p)) => (EntityKind::Product, p),
            (Some(c), None) => (EntityKind::Component, c),
            (None, None) => return None,
        };
        Some(Entity {
            kind,
            name: entry.value.as_text().to_owned(),
        })
    }

    /// Index the next turn should use.
    pub fn next_turn_index(&self) -> u32 {
        self.last_turn.map_or(0, |t| t + 1)
    }

    /// Record that a turn happened even if it supplied nothing.
    pub fn mark_turn(&mut self, turn_index: u32) {
        self.last_turn = Some(self.last_turn.map_or(turn_index, |t| t.max(turn_index)));
    }

    /// Replay one recorded turn.
    pub fn apply(&mut self, turn_index: u32, supplied: &SuppliedSlots) {
        self.mark_turn(turn_index);
        for (slot, value) in supplied {
            self.update(*slot, value.clone(), turn_index);
        }
    }

    pub fn snapshot(&self) -> BTreeMap<Slot, SlotEntry> {
        self.slots.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.last_turn = None;
    }
}
