//! Deterministic question routing for the release-data assistant.
//!
//! | module         | role |
//! |----------------|------|
//! | [`identifier`] | shape-based classification of raw tokens |
//! | [`entity`]     | closed component/product enumerations |
//! | [`catalogue`]  | the 17 data-service operations and their parameters |
//! | [`extract`]    | free text → identifiers, entities, intents |
//! | [`memory`]     | per-session slot memory |
//! | [`resolver`]   | turn + memory → operation, clarification or rejection |

pub mod catalogue;
pub mod entity;
pub mod extract;
pub mod identifier;
pub mod memory;
pub mod resolver;

pub use catalogue::{BoundSlots, Operation, OperationDescriptor, Param, CATALOGUE};
pub use entity::{lookup, validate_entity, Entity, EntityKind, EntityRejection};
pub use extract::{Extractor, Intent, TurnSlots};
pub use identifier::{classify, Classifier, Identifier, IdentifierKind};
pub use memory::{Slot, SlotMemory, SlotValue, SuppliedSlots};
pub use resolver::{resolve, supplied_slots, RejectReason, Resolution, TurnContext};
