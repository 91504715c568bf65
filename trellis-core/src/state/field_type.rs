//! Field type tags and the value equality each one uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The rendered/element type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Number,
    Checkbox,
    Radio,
    Select,
    SelectMultiple,
    Hidden,
    Other(String),
}

impl FieldType {
    /// Checkbox and radio fields carry a `checked` metadata slot.
    pub fn is_checkable(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::Radio)
    }

    /// Equality used to decide whether a value write is a change.
    ///
    /// Numbers compare numerically, multi-selects compare as multisets and
    /// everything else is strict JSON equality.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match self {
            FieldType::Number => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            FieldType::SelectMultiple => match (a, b) {
                (Value::Array(x), Value::Array(y)) => same_elements(x, y),
                _ => a == b,
            },
            _ => a == b,
        }
    }
}

fn same_elements(a: &[Value], b: &[Value]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|item| {
        let slot = b
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && candidate == item);
        match slot {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        match tag {
            "text" => FieldType::Text,
            "number" => FieldType::Number,
            "checkbox" => FieldType::Checkbox,
            "radio" => FieldType::Radio,
            "select" => FieldType::Select,
            "select-multiple" => FieldType::SelectMultiple,
            "hidden" => FieldType::Hidden,
            other => FieldType::Other(other.to_string()),
        }
    }
}
