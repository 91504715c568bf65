//! Field Implementation
//!
//! A Field is a named input holding a value plus keyed metadata (disabled,
//! checked, options, ...), replicated per state key.
//!
//! # How Fields Work
//!
//! 1. Each state key owns an isolated value slot and metadata map. The
//!    default state is seeded when the field is built; other states are
//!    seeded lazily, the first time they are addressed, by a full reset to the
//!    declared initial value and metadata. Seeding records are settled on the
//!    spot, so they are never reported as changes.
//!
//! 2. A write compares the new value with the stored one (type-specific
//!    equality for values, strict equality for metadata). Equal writes are
//!    ignored. Otherwise the slot is updated, a change record is appended to
//!    the shared [`ChangeSet`] and changes are processed, which dispatches a
//!    batch to this field's listeners unless the context asks for a dry run.
//!
//! 3. Switching state never touches stored values. It diffs the target state
//!    against the current one and records a synthetic change for each slot
//!    that differs, so listeners cannot tell a switch from a write.
//!
//! # Locking
//!
//! The state lock is released before the change set is touched and before
//! listeners run, so listeners may write back into the field.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::change::{
    meta_name, ChangeBatch, ChangeFilter, ChangeRecord, ChangedNames, PendingChange, Track,
    TrackKind,
};
use super::change_set::ChangeSet;
use super::context::Context;
use super::field_type::FieldType;
use crate::config::DEFAULT_STATE_KEY;
use crate::reactive::{EffectManager, ListenerId, Listeners, Propagation};

/// Metadata key marking a field as disabled.
pub const DISABLED: &str = "disabled";
/// Metadata key holding the checked flag of checkbox and radio fields.
pub const CHECKED: &str = "checked";

/// Unique identifier for a field.
///
/// Same-name fields (radio groups) share a name but never an id, so their
/// change tracks stay separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldId(u64);

impl FieldId {
    /// Generate a new unique field ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared initial value of one metadata key.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialMeta {
    pub value: Value,
    /// Re-applied by a non-full reset.
    pub resettable: bool,
}

/// Value and metadata of one state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub value: Value,
    pub meta: IndexMap<String, Value>,
}

#[derive(Debug)]
struct States {
    current: String,
    slots: IndexMap<String, StateSnapshot>,
}

pub struct FieldBuilder {
    name: String,
    field_type: FieldType,
    initial_value: Value,
    initial_meta: IndexMap<String, InitialMeta>,
    default_state_key: String,
}

impl FieldBuilder {
    pub fn initial_value(mut self, value: Value) -> Self {
        self.initial_value = value;
        self
    }

    pub fn initial_meta(mut self, key: impl Into<String>, value: Value, resettable: bool) -> Self {
        self.initial_meta.insert(key.into(), InitialMeta { value, resettable });
        self
    }

    pub fn default_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.default_state_key = state_key.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the field, register its relay dependencies and seed its
    /// default state.
    pub fn build(self, changes: Arc<ChangeSet>, effects: Arc<EffectManager>) -> Arc<Field> {
        let field = Field {
            id: FieldId::new(),
            name: self.name,
            field_type: self.field_type,
            initial_value: self.initial_value,
            initial_meta: self.initial_meta,
            states: RwLock::new(States {
                current: self.default_state_key.clone(),
                slots: IndexMap::new(),
            }),
            changes,
            effects,
            listeners: Listeners::new(),
        };
        field.initialize_dependencies();
        field.initialize_state(&self.default_state_key, &Context::new());
        Arc::new(field)
    }
}

pub struct Field {
    id: FieldId,
    name: String,
    field_type: FieldType,
    initial_value: Value,
    initial_meta: IndexMap<String, InitialMeta>,
    states: RwLock<States>,
    changes: Arc<ChangeSet>,
    effects: Arc<EffectManager>,
    listeners: Listeners<ChangeBatch>,
}

impl Field {
    pub fn builder(name: impl Into<String>, field_type: FieldType) -> FieldBuilder {
        FieldBuilder {
            name: name.into(),
            field_type,
            initial_value: Value::Null,
            initial_meta: IndexMap::new(),
            default_state_key: DEFAULT_STATE_KEY.to_string(),
        }
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn initial_value(&self) -> &Value {
        &self.initial_value
    }

    pub fn initial_meta(&self) -> &IndexMap<String, InitialMeta> {
        &self.initial_meta
    }

    pub fn current_state_key(&self) -> String {
        self.states.read().current.clone()
    }

    /// State keys initialized so far, in creation order.
    pub fn state_keys(&self) -> Vec<String> {
        self.states.read().slots.keys().cloned().collect()
    }

    pub fn is_state_initialized(&self, state_key: &str) -> bool {
        self.states.read().slots.contains_key(state_key)
    }

    fn resolve_state(&self, ctx: &Context) -> String {
        ctx.state_key
            .clone()
            .unwrap_or_else(|| self.current_state_key())
    }

    // ------------------------------------------------------------------------
    // State initialization
    // ------------------------------------------------------------------------

    /// Seed `state_key` with a full reset the first time it is used.
    ///
    /// Returns true if this call initialized the state. The seeding changes
    /// are recorded and settled silently: they are never reported and never
    /// dispatched.
    pub fn initialize_state(&self, state_key: &str, ctx: &Context) -> bool {
        {
            let mut states = self.states.write();
            if states.slots.contains_key(state_key) {
                return false;
            }
            states
                .slots
                .insert(state_key.to_string(), StateSnapshot::default());
        }

        debug!(field = %self.name, state = state_key, "initializing state");
        let seed = ctx.merge(&Context::new().state(state_key).dry_run());
        self.reset(&seed, true);
        self.changes.settle(self, state_key);
        true
    }

    /// Register this field as a relay in the effect graph: the bare name
    /// depends on its `disabled` slot and, for checkable fields, on its
    /// `checked` slot.
    pub fn initialize_dependencies(&self) {
        self.effects
            .add_dependency(self.name.clone(), meta_name(&self.name, DISABLED));
        if self.field_type.is_checkable() {
            self.effects
                .add_dependency(self.name.clone(), meta_name(&self.name, CHECKED));
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get_value(&self, ctx: &Context) -> Value {
        let state_key = self.resolve_state(ctx);
        self.initialize_state(&state_key, ctx);

        let states = self.states.read();
        let Some(slot) = states.slots.get(&state_key) else {
            return Value::Null;
        };
        if ctx.nulls_disabled() && slot.meta.get(DISABLED) == Some(&Value::Bool(true)) {
            return Value::Null;
        }
        slot.value.clone()
    }

    /// `None` when the key was never set in that state.
    pub fn get_meta_value(&self, meta_key: &str, ctx: &Context) -> Option<Value> {
        let state_key = self.resolve_state(ctx);
        self.initialize_state(&state_key, ctx);

        self.states
            .read()
            .slots
            .get(&state_key)
            .and_then(|slot| slot.meta.get(meta_key).cloned())
    }

    pub fn is_disabled(&self, ctx: &Context) -> bool {
        self.get_meta_value(DISABLED, ctx) == Some(Value::Bool(true))
    }

    pub fn is_checked(&self, ctx: &Context) -> bool {
        self.get_meta_value(CHECKED, ctx) == Some(Value::Bool(true))
    }

    /// Copy of one state's value and metadata.
    pub fn snapshot(&self, ctx: &Context) -> StateSnapshot {
        let state_key = self.resolve_state(ctx);
        self.initialize_state(&state_key, ctx);

        self.states
            .read()
            .slots
            .get(&state_key)
            .cloned()
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Store `value` in the target state if it differs from the stored one.
    ///
    /// Returns the changed names reported by processing the value track, or
    /// an empty set if nothing changed.
    pub fn set_value(&self, value: Value, ctx: &Context) -> ChangedNames {
        let state_key = self.resolve_state(ctx);
        self.initialize_state(&state_key, ctx);

        let old_value = {
            let mut states = self.states.write();
            let Some(slot) = states.slots.get_mut(&state_key) else {
                return ChangedNames::new();
            };
            if self.field_type.values_equal(&slot.value, &value) {
                return ChangedNames::new();
            }
            std::mem::replace(&mut slot.value, value.clone())
        };

        self.changes.add(PendingChange {
            field_id: self.id,
            field_name: self.name.clone(),
            state_key,
            track: Track::Value,
            old_value,
            new_value: value,
            initiator: ctx.initiator.clone(),
        });
        self.process_changes(Some(TrackKind::Value), !ctx.processes_changes())
    }

    /// Store `value` under `meta_key` in the target state if it differs
    /// (strictly) from the stored one.
    pub fn set_meta_value(&self, meta_key: &str, value: Value, ctx: &Context) -> ChangedNames {
        let state_key = self.resolve_state(ctx);
        self.initialize_state(&state_key, ctx);

        let old_value = {
            let mut states = self.states.write();
            let Some(slot) = states.slots.get_mut(&state_key) else {
                return ChangedNames::new();
            };
            if slot.meta.get(meta_key) == Some(&value) {
                return ChangedNames::new();
            }
            slot.meta
                .insert(meta_key.to_string(), value.clone())
                .unwrap_or(Value::Null)
        };

        self.changes.add(PendingChange {
            field_id: self.id,
            field_name: self.name.clone(),
            state_key,
            track: Track::Meta(meta_key.to_string()),
            old_value,
            new_value: value,
            initiator: ctx.initiator.clone(),
        });
        self.process_changes(Some(TrackKind::Meta), !ctx.processes_changes())
    }

    /// Re-apply the declared initial metadata (all of it when `full`,
    /// otherwise only resettable keys) and the initial value.
    ///
    /// Each write records and reports on its own; the result is the union of
    /// those reports and a final processing pass over the field.
    pub fn reset(&self, ctx: &Context, full: bool) -> ChangedNames {
        let state_key = self.resolve_state(ctx);
        self.initialize_state(&state_key, ctx);
        let scoped = ctx.merge(&Context::new().state(state_key));

        let mut changed = ChangedNames::new();
        for (key, initial) in &self.initial_meta {
            if full || initial.resettable {
                changed.extend(self.set_meta_value(key, initial.value.clone(), &scoped));
            }
        }
        changed.extend(self.set_value(self.initial_value.clone(), &scoped));
        changed.extend(self.process_changes(None, !ctx.processes_changes()));
        changed
    }

    /// Make `state_key` the current state.
    ///
    /// Stored values are untouched. For the value and every metadata key of
    /// the target state that differs from the current state, a change is
    /// recorded with the current slot as old value and the target slot as new
    /// value, tagged with the target state.
    pub fn switch_state(&self, state_key: &str, ctx: &Context) -> ChangedNames {
        self.initialize_state(state_key, ctx);

        let pending: Vec<PendingChange> = {
            let mut states = self.states.write();
            let empty = StateSnapshot::default();
            let current = states.slots.get(&states.current).unwrap_or(&empty);
            let target = states.slots.get(state_key).unwrap_or(&empty);

            let mut pending = Vec::new();
            let mut diff = |track: Track, old_value: Value, new_value: Value| {
                pending.push(PendingChange {
                    field_id: self.id,
                    field_name: self.name.clone(),
                    state_key: state_key.to_string(),
                    track,
                    old_value,
                    new_value,
                    initiator: ctx.initiator.clone(),
                });
            };

            if !self.field_type.values_equal(&current.value, &target.value) {
                diff(Track::Value, current.value.clone(), target.value.clone());
            }
            for (key, value) in &target.meta {
                let old_value = current.meta.get(key);
                if old_value != Some(value) {
                    diff(
                        Track::Meta(key.clone()),
                        old_value.cloned().unwrap_or(Value::Null),
                        value.clone(),
                    );
                }
            }

            debug!(
                field = %self.name,
                from = %states.current,
                to = state_key,
                differences = pending.len(),
                "switching state"
            );
            states.current = state_key.to_string();
            pending
        };

        for change in pending {
            self.changes.add(change);
        }
        self.process_changes(None, !ctx.processes_changes())
    }

    // ------------------------------------------------------------------------
    // Change tracking
    // ------------------------------------------------------------------------

    /// See [`ChangeSet::process_changes`].
    pub fn process_changes(&self, track: Option<TrackKind>, dry_run: bool) -> ChangedNames {
        self.changes.process_changes(self, track, dry_run)
    }

    pub fn get_changes(&self, filter: &ChangeFilter) -> Vec<ChangeRecord> {
        self.changes.get_field_changes(self, filter)
    }

    pub fn get_change(&self, filter: &ChangeFilter) -> Option<ChangeRecord> {
        self.changes.get_field_change(self, filter)
    }

    pub fn has_changes(&self, filter: &ChangeFilter) -> bool {
        self.changes.has_changes(self, filter)
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    /// Receive every change batch this field dispatches.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeBatch) -> Propagation + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn dispatch(&self, batch: &ChangeBatch) {
        self.listeners.dispatch(batch);
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("current_state", &self.current_state_key())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
