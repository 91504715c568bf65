//! Change Records
//!
//! A change record describes one mutation of one facet ("track") of a field
//! in one state: either its value or a single metadata key.

use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

use super::field::FieldId;

/// The propagating frontier of changed field/meta names.
///
/// A value change contributes the bare field name, a metadata change
/// contributes `"field:metaKey"`.
pub type ChangedNames = IndexSet<String>;

/// Build the graph key for one metadata slot of a field.
pub fn meta_name(field: &str, meta_key: &str) -> String {
    format!("{field}:{meta_key}")
}

/// The facet of a field a change concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "key", rename_all = "kebab-case")]
pub enum Track {
    Value,
    #[serde(rename = "meta-value")]
    Meta(String),
}

impl Track {
    pub fn kind(&self) -> TrackKind {
        match self {
            Track::Value => TrackKind::Value,
            Track::Meta(_) => TrackKind::Meta,
        }
    }

    pub fn meta_key(&self) -> Option<&str> {
        match self {
            Track::Value => None,
            Track::Meta(key) => Some(key),
        }
    }

    /// The changed-name this track contributes for `field`.
    pub fn changed_name(&self, field: &str) -> String {
        match self {
            Track::Value => field.to_string(),
            Track::Meta(key) => meta_name(field, key),
        }
    }
}

/// Track type without the metadata key, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackKind {
    Value,
    #[serde(rename = "meta-value")]
    Meta,
}

/// A mutation waiting to be appended to a change set.
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub field_id: FieldId,
    pub field_name: String,
    pub state_key: String,
    pub track: Track,
    pub old_value: Value,
    pub new_value: Value,
    pub initiator: Option<String>,
}

/// A recorded change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub id: u64,
    pub field_id: FieldId,
    pub field_name: String,
    pub state_key: String,
    pub track: Track,
    pub old_value: Value,
    pub new_value: Value,
    pub initiator: Option<String>,
    pub date: SystemTime,
    /// Consumed by a non-dry-run `process_changes`. Never reverts.
    pub processed: bool,
    /// The newest record for its (field, track).
    pub last: bool,
}

impl ChangeRecord {
    pub(crate) fn from_pending(id: u64, pending: PendingChange) -> Self {
        Self {
            id,
            field_id: pending.field_id,
            field_name: pending.field_name,
            state_key: pending.state_key,
            track: pending.track,
            old_value: pending.old_value,
            new_value: pending.new_value,
            initiator: pending.initiator,
            date: SystemTime::now(),
            processed: false,
            last: true,
        }
    }

    pub fn changed_name(&self) -> String {
        self.track.changed_name(&self.field_name)
    }
}

/// Which state keys a query covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StateScope {
    /// The field's current state at query time.
    #[default]
    Current,
    Key(String),
    Any,
}

/// Query over a field's change records. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub track: Option<TrackKind>,
    /// Only consulted when `track` is `Meta`.
    pub meta_key: Option<String>,
    pub last: Option<bool>,
    pub processed: Option<bool>,
    pub state: StateScope,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value() -> Self {
        Self {
            track: Some(TrackKind::Value),
            ..Self::default()
        }
    }

    pub fn meta(key: impl Into<String>) -> Self {
        Self {
            track: Some(TrackKind::Meta),
            meta_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn track(mut self, kind: TrackKind) -> Self {
        self.track = Some(kind);
        self
    }

    pub fn last(mut self, last: bool) -> Self {
        self.last = Some(last);
        self
    }

    pub fn processed(mut self, processed: bool) -> Self {
        self.processed = Some(processed);
        self
    }

    pub fn state(mut self, state_key: impl Into<String>) -> Self {
        self.state = StateScope::Key(state_key.into());
        self
    }

    pub fn any_state(mut self) -> Self {
        self.state = StateScope::Any;
        self
    }

    /// `current_state` resolves [`StateScope::Current`].
    pub(crate) fn matches(
        &self,
        record: &ChangeRecord,
        field_id: FieldId,
        current_state: &str,
    ) -> bool {
        if record.field_id != field_id {
            return false;
        }
        match &self.state {
            StateScope::Current if record.state_key != current_state => return false,
            StateScope::Key(key) if record.state_key != *key => return false,
            _ => {}
        }
        if let Some(kind) = self.track {
            if record.track.kind() != kind {
                return false;
            }
            if kind == TrackKind::Meta {
                if let Some(key) = &self.meta_key {
                    if record.track.meta_key() != Some(key.as_str()) {
                        return false;
                    }
                }
            }
        }
        if self.last.is_some_and(|last| record.last != last) {
            return false;
        }
        if self.processed.is_some_and(|processed| record.processed != processed) {
            return false;
        }
        true
    }
}

/// The records delivered by one change notification.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    field_id: FieldId,
    field_name: String,
    records: Arc<[ChangeRecord]>,
}

impl ChangeBatch {
    pub(crate) fn new(
        field_id: FieldId,
        field_name: impl Into<String>,
        records: Vec<ChangeRecord>,
    ) -> Self {
        Self {
            field_id,
            field_name: field_name.into(),
            records: records.into(),
        }
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn changed_names(&self) -> ChangedNames {
        self.records.iter().map(ChangeRecord::changed_name).collect()
    }

    /// The record for `track`, if the batch carries one.
    pub fn get(&self, track: &Track) -> Option<&ChangeRecord> {
        self.records.iter().find(|record| record.track == *track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(field_id: FieldId, state: &str, track: Track) -> ChangeRecord {
        ChangeRecord::from_pending(
            1,
            PendingChange {
                field_id,
                field_name: "email".to_string(),
                state_key: state.to_string(),
                track,
                old_value: Value::Null,
                new_value: json!("a@b.c"),
                initiator: None,
            },
        )
    }

    #[test]
    fn changed_names_per_track() {
        assert_eq!(Track::Value.changed_name("email"), "email");
        assert_eq!(
            Track::Meta("disabled".to_string()).changed_name("email"),
            "email:disabled"
        );
    }

    #[test]
    fn new_record_is_last_and_unprocessed() {
        let rec = record(FieldId::new(), "default", Track::Value);
        assert!(rec.last);
        assert!(!rec.processed);
    }

    #[test]
    fn filter_scopes_state() {
        let id = FieldId::new();
        let rec = record(id, "step-2", Track::Value);

        assert!(!ChangeFilter::new().matches(&rec, id, "default"));
        assert!(ChangeFilter::new().matches(&rec, id, "step-2"));
        assert!(ChangeFilter::new().state("step-2").matches(&rec, id, "default"));
        assert!(ChangeFilter::new().any_state().matches(&rec, id, "default"));
        assert!(!ChangeFilter::new().any_state().matches(&rec, FieldId::new(), "default"));
    }

    #[test]
    fn filter_by_track_and_meta_key() {
        let id = FieldId::new();
        let rec = record(id, "default", Track::Meta("disabled".to_string()));

        assert!(!ChangeFilter::value().matches(&rec, id, "default"));
        assert!(ChangeFilter::new().track(TrackKind::Meta).matches(&rec, id, "default"));
        assert!(ChangeFilter::meta("disabled").matches(&rec, id, "default"));
        assert!(!ChangeFilter::meta("checked").matches(&rec, id, "default"));
    }

    #[test]
    fn filter_by_flags() {
        let id = FieldId::new();
        let mut rec = record(id, "default", Track::Value);
        rec.processed = true;

        assert!(ChangeFilter::new().processed(true).matches(&rec, id, "default"));
        assert!(!ChangeFilter::new().processed(false).matches(&rec, id, "default"));
        assert!(ChangeFilter::new().last(true).matches(&rec, id, "default"));
    }

    #[test]
    fn track_serializes_with_kind_tag() {
        let json = serde_json::to_value(Track::Meta("checked".to_string())).unwrap();
        assert_eq!(json, json!({"type": "meta-value", "key": "checked"}));
        assert_eq!(serde_json::to_value(Track::Value).unwrap(), json!({"type": "value"}));
    }
}
