//! Element Adapter Seam
//!
//! An element adapter mirrors a field onto a rendered input widget and
//! back. Adapters report problems as status codes; the field treats any
//! non-`Received` status as a no-op and never retries.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::change::ChangedNames;
use super::context::Context;
use super::field::Field;

/// Outcome of a widget read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterStatus {
    Received,
    InvalidElement,
    TypeMismatch,
    MetaKeyNotExists,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterRead {
    pub value: Value,
    pub status: AdapterStatus,
}

impl AdapterRead {
    pub fn received(value: Value) -> Self {
        Self {
            value,
            status: AdapterStatus::Received,
        }
    }

    pub fn failed(status: AdapterStatus) -> Self {
        Self {
            value: Value::Null,
            status,
        }
    }
}

/// Access to one rendered widget.
pub trait ElementAdapter {
    fn read_value(&self) -> AdapterRead;

    fn read_meta(&self, meta_key: &str) -> AdapterRead;

    fn write_value(&self, value: &Value) -> AdapterStatus;

    fn write_meta(&self, meta_key: &str, value: &Value) -> AdapterStatus;
}

impl Field {
    /// Copy the widget's value into the field.
    pub fn pull_from<A: ElementAdapter + ?Sized>(
        &self,
        adapter: &A,
        ctx: &Context,
    ) -> ChangedNames {
        let read = adapter.read_value();
        if read.status != AdapterStatus::Received {
            debug!(field = %self.name(), status = ?read.status, "ignoring failed widget read");
            return ChangedNames::new();
        }
        self.set_value(read.value, ctx)
    }

    /// Copy one widget metadata slot into the field.
    pub fn pull_meta_from<A: ElementAdapter + ?Sized>(
        &self,
        adapter: &A,
        meta_key: &str,
        ctx: &Context,
    ) -> ChangedNames {
        let read = adapter.read_meta(meta_key);
        if read.status != AdapterStatus::Received {
            debug!(
                field = %self.name(),
                meta_key,
                status = ?read.status,
                "ignoring failed widget read"
            );
            return ChangedNames::new();
        }
        self.set_meta_value(meta_key, read.value, ctx)
    }

    /// Write the field's value and metadata to the widget.
    ///
    /// Every slot is attempted; the first failure status is returned.
    pub fn push_to<A: ElementAdapter + ?Sized>(&self, adapter: &A, ctx: &Context) -> AdapterStatus {
        let snapshot = self.snapshot(ctx);
        let value = if ctx.nulls_disabled() && self.is_disabled(ctx) {
            Value::Null
        } else {
            snapshot.value
        };

        let mut outcome = AdapterStatus::Received;
        let mut record = |status: AdapterStatus, slot: &str| {
            if status != AdapterStatus::Received {
                debug!(field = %self.name(), slot, ?status, "widget write tolerated");
                if outcome == AdapterStatus::Received {
                    outcome = status;
                }
            }
        };

        record(adapter.write_value(&value), "value");
        for (key, meta) in &snapshot.meta {
            record(adapter.write_meta(key, meta), key.as_str());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use indexmap::IndexMap;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::config::ChangeSetConfig;
    use crate::reactive::EffectManager;
    use crate::state::field::DISABLED;
    use crate::state::{ChangeSet, FieldType};

    #[derive(Default)]
    struct FakeInput {
        value: Mutex<Value>,
        meta: Mutex<IndexMap<String, Value>>,
        broken: bool,
    }

    impl ElementAdapter for FakeInput {
        fn read_value(&self) -> AdapterRead {
            if self.broken {
                return AdapterRead::failed(AdapterStatus::InvalidElement);
            }
            AdapterRead::received(self.value.lock().clone())
        }

        fn read_meta(&self, meta_key: &str) -> AdapterRead {
            match self.meta.lock().get(meta_key) {
                Some(value) => AdapterRead::received(value.clone()),
                None => AdapterRead::failed(AdapterStatus::MetaKeyNotExists),
            }
        }

        fn write_value(&self, value: &Value) -> AdapterStatus {
            if self.broken {
                return AdapterStatus::InvalidElement;
            }
            *self.value.lock() = value.clone();
            AdapterStatus::Received
        }

        fn write_meta(&self, meta_key: &str, value: &Value) -> AdapterStatus {
            if meta_key == "options" {
                return AdapterStatus::TypeMismatch;
            }
            self.meta.lock().insert(meta_key.to_string(), value.clone());
            AdapterStatus::Received
        }
    }

    fn field() -> Arc<Field> {
        Field::builder("email", FieldType::Text)
            .initial_meta(DISABLED, json!(false), true)
            .build(
                Arc::new(ChangeSet::new(ChangeSetConfig::default())),
                Arc::new(EffectManager::new()),
            )
    }

    #[test]
    fn pull_copies_widget_value() {
        let field = field();
        let input = FakeInput::default();
        *input.value.lock() = json!("typed");

        let changed = field.pull_from(&input, &Context::new().initiator("widget"));

        assert!(changed.contains("email"));
        assert_eq!(field.get_value(&Context::new()), json!("typed"));
    }

    #[test]
    fn failed_reads_are_ignored() {
        let field = field();
        let input = FakeInput {
            broken: true,
            ..FakeInput::default()
        };

        assert!(field.pull_from(&input, &Context::new()).is_empty());
        assert!(field.pull_meta_from(&input, "checked", &Context::new()).is_empty());
        assert_eq!(field.get_value(&Context::new()), Value::Null);
    }

    #[test]
    fn push_writes_value_and_meta() {
        let field = field();
        field.set_value(json!("x@y.z"), &Context::new());
        let input = FakeInput::default();

        assert_eq!(field.push_to(&input, &Context::new()), AdapterStatus::Received);
        assert_eq!(*input.value.lock(), json!("x@y.z"));
        assert_eq!(input.meta.lock().get(DISABLED), Some(&json!(false)));
    }

    #[test]
    fn push_tolerates_failed_writes() {
        let field = field();
        field.set_meta_value("options", json!(["a"]), &Context::new());
        field.set_value(json!("v"), &Context::new());
        let input = FakeInput::default();

        let status = field.push_to(&input, &Context::new());

        assert_eq!(status, AdapterStatus::TypeMismatch);
        assert_eq!(*input.value.lock(), json!("v"));
        assert_eq!(input.meta.lock().get(DISABLED), Some(&json!(false)));
    }
}
