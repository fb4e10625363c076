//! The structured log record produced by C3 and carried through C4/C5/C6.

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

/// A field's parsed value. Pattern-mode captures are always [`Value::Text`];
/// structured-document and custom-function results may be any JSON-compatible
/// shape. See `spec.md` §9, "Value representation of record fields".
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Json(JsonValue),
}

impl Value {
    /// Stringified form used by the template matcher when comparing against
    /// a regular expression (`spec.md` §4.6, §9).
    pub fn as_match_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Json(JsonValue::String(s)) => s.clone(),
            Value::Json(other) => other.to_string(),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

/// An immutable-once-emitted, insertion-ordered field map. Insertion order
/// is load-bearing: §4.3/§4.4 of `spec.md` refer to "the last field" of a
/// record, which only has a stable meaning if field order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the most recently inserted field, used by the retention
    /// policy to append continuation lines (`spec.md` §4.3).
    pub fn last_field_name(&self) -> Option<&str> {
        self.0.keys().last().map(String::as_str)
    }

    /// Append `extra` to the last field's text, separated by `sep`. Used
    /// only in pattern mode, where every value is `Value::Text`.
    pub fn append_to_last_field(&mut self, sep: &str, extra: &str) {
        if let Some(key) = self.0.keys().last().cloned() {
            if let Some(Value::Text(existing)) = self.0.get_mut(&key) {
                existing.push_str(sep);
                existing.push_str(extra);
            }
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}
