//! Field State and Change Tracking
//!
//! This module holds the stateful half of the engine: fields with
//! per-state storage, the shared change ledger and field collections.
//!
//! # Concepts
//!
//! ## Fields
//!
//! A [`Field`] holds a value plus keyed metadata for each state key (for
//! example one per wizard step). States are isolated from each other and
//! seeded lazily from the field's declared initial value and metadata.
//!
//! ## Change Records
//!
//! Every effective write appends a [`ChangeRecord`] to the shared
//! [`ChangeSet`]. Processing a field's changes projects its pending `last`
//! records to changed names (`"field"` or `"field:metaKey"`), marks them
//! processed and dispatches them to the field's listeners as one
//! [`ChangeBatch`].
//!
//! ## Collections
//!
//! A [`FieldsCollection`] groups fields, including same-name groups, and
//! relays their batches through one listener list.

mod adapter;
mod change;
mod change_set;
mod collection;
mod context;
mod field;
mod field_type;

pub use adapter::{AdapterRead, AdapterStatus, ElementAdapter};
pub use change::{
    meta_name, ChangeBatch, ChangeFilter, ChangeRecord, ChangedNames, PendingChange, StateScope,
    Track, TrackKind,
};
pub use change_set::ChangeSet;
pub use collection::FieldsCollection;
pub use context::Context;
pub use field::{Field, FieldBuilder, FieldId, InitialMeta, StateSnapshot, CHECKED, DISABLED};
pub use field_type::FieldType;
