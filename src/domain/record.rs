//! Schema-less records.

use crate::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Default name of the identifier field when a table definition does not name one.
pub const DEFAULT_KEY_FIELD: &str = "id";

/// Identifier of a stored record.
///
/// Locally generated keys are text (millisecond digits); keys assigned by the
/// store are integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Reads an identifier out of a JSON value. Only integers and strings qualify.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(RecordId::Text(s.clone())),
            JsonValue::Number(n) => n.as_i64().map(RecordId::Int),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            RecordId::Int(i) => JsonValue::from(*i),
            RecordId::Text(s) => JsonValue::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(i) => write!(f, "{i}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

/// An ordered field → value map.
///
/// Field order is insertion order and is the column order used for INSERT
/// statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, JsonValue>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a record from a JSON object; anything else is rejected.
    pub fn from_json(value: JsonValue) -> RepositoryResult<Self> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(RepositoryError::InvalidRecord(format!(
                "record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<JsonValue> {
        self.0.shift_remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifier stored under `key_field`, if present and usable as an id.
    pub fn id(&self, key_field: &str) -> Option<RecordId> {
        self.get(key_field).and_then(RecordId::from_json)
    }

    pub fn set_id(&mut self, key_field: &str, id: &RecordId) {
        self.set(key_field, id.to_json());
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.as_str())
    }

    /// Integer accessor. Numeric strings are accepted since some engines hand
    /// back integers as text.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean accessor. Engines without a boolean type store 0/1.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::Number(n) => n.as_i64().map(|i| i != 0),
            JsonValue::String(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parses a text column holding serialized JSON (objects and arrays are
    /// stored as text).
    pub fn get_json(&self, field: &str) -> Option<JsonValue> {
        match self.get(field)? {
            JsonValue::String(s) => serde_json::from_str(s).ok(),
            other => Some(other.clone()),
        }
    }

    /// True when the field is absent or explicitly null.
    pub fn is_null(&self, field: &str) -> bool {
        self.get(field).map_or(true, JsonValue::is_null)
    }
}

impl From<Map<String, JsonValue>> for Record {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl IntoIterator for Record {
    type Item = (String, JsonValue);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_order_is_insertion_order() {
        let record = Record::new().with("zeta", 1).with("alpha", 2).with("mid", 3);
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_typed_accessors() {
        let record = Record::from_json(json!({
            "title": "hello",
            "views": "42",
            "score": 1.5,
            "published": 1,
            "tags": "[\"a\",\"b\"]"
        }))
        .unwrap();

        assert_eq!(record.get_str("title"), Some("hello"));
        assert_eq!(record.get_i64("views"), Some(42));
        assert_eq!(record.get_f64("score"), Some(1.5));
        assert_eq!(record.get_bool("published"), Some(true));
        assert_eq!(record.get_json("tags"), Some(json!(["a", "b"])));
        assert!(record.is_null("missing"));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = Record::from_json(json!([1, 2])).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRecord(_)));
    }

    #[test]
    fn test_record_id_from_json() {
        assert_eq!(RecordId::from_json(&json!(7)), Some(RecordId::Int(7)));
        assert_eq!(
            RecordId::from_json(&json!("1697040000000")),
            Some(RecordId::Text("1697040000000".into()))
        );
        assert_eq!(RecordId::from_json(&json!(1.5)), None);
        assert_eq!(RecordId::Int(3).to_string(), "3");
    }
}
