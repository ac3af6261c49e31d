use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extracted fields keyed by canonical key. `Value::Null` means "not provided".
pub type Fields = BTreeMap<String, Value>;

/// The abstract action a recognized command maps to (e.g. "add_expense", "delete").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentTag(String);

impl IntentTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IntentTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// A recognized command: which intent matched and what the extractor pulled out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRequest {
    pub intent: IntentTag,
    pub fields: Fields,
}

impl ParsedRequest {
    /// Field value if it was provided (non-null).
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Whole numbers that fit in `i64`. Larger values are `None`, never saturated.
    pub fn integer(&self, key: &str) -> Option<i64> {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
        self.field(key).and_then(|value| {
            value.as_i64().or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && (-LIMIT..LIMIT).contains(f))
                    .map(|f| f as i64)
            })
        })
    }

    /// Only the provided fields, in canonical key order.
    pub fn provided(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().filter(|(_, value)| !value.is_null())
    }
}
