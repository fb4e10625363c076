//! C6 — the template matcher. Decides whether a record satisfies a
//! field-wise template: literal equality, an existence probe, or a regular
//! expression against the stringified value (`spec.md` §4.6).

use indexmap::IndexMap;
use regex::Regex;

use crate::record::{Record, Value};

#[derive(Debug, Clone)]
pub enum Expected {
    Literal(Value),
    Pattern(Regex),
    /// Matches if the field exists, regardless of value.
    Absent,
}

impl From<Value> for Expected {
    fn from(v: Value) -> Self {
        Expected::Literal(v)
    }
}

impl From<&str> for Expected {
    fn from(s: &str) -> Self {
        Expected::Literal(Value::Text(s.to_owned()))
    }
}

impl From<Regex> for Expected {
    fn from(r: Regex) -> Self {
        Expected::Pattern(r)
    }
}

/// A field-wise match criterion. An empty template matches any record.
#[derive(Debug, Clone, Default)]
pub struct Template(IndexMap<String, Expected>);

impl Template {
    pub fn new() -> Self {
        Template(IndexMap::new())
    }

    pub fn with(mut self, field: impl Into<String>, expected: impl Into<Expected>) -> Self {
        self.0.insert(field.into(), expected.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.0.iter().all(|(field, expected)| {
            let Some(value) = record.get(field) else {
                return false;
            };
            match expected {
                Expected::Absent => true,
                Expected::Pattern(re) => re.is_match(&value.as_match_text()),
                Expected::Literal(expected_value) => value == expected_value,
            }
        })
    }
}
