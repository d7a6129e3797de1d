//! Firestore REST API types and JSON conversion.
//!
//! Records are stored as plain Firestore maps derived from their serde JSON
//! form. Integers become `integerValue`, every other number `doubleValue`, so
//! fractional durations survive a round trip unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{FirestoreError, FirestoreResult};

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document fields
    #[serde(default)]
    pub fields: Option<HashMap<String, Value>>,
    /// Create time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// Update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Last path segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name.as_deref().and_then(|n| n.rsplit('/').next())
    }
}

/// List documents response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Option<Vec<Document>>,
    pub next_page_token: Option<String>,
}

/// Timestamp value for native TTL fields.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::TimestampValue(at.to_rfc3339())
}

/// Convert a JSON value into a Firestore value.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => Value::BooleanValue(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) if !n.is_f64() => Value::IntegerValue(i.to_string()),
            _ => Value::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::StringValue(s.clone()),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_value).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_value(v)))
                    .collect(),
            ),
        }),
    }
}

/// Convert a Firestore value back into JSON.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s) | Value::StringValue(s) => serde_json::Value::String(s.clone()),
        Value::ArrayValue(array) => serde_json::Value::Array(
            array
                .values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(value_to_json)
                .collect(),
        ),
        Value::MapValue(map) => serde_json::Value::Object(
            map.fields
                .iter()
                .flatten()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

/// Serialize a record into document fields.
pub fn to_fields<T: Serialize>(record: &T) -> FirestoreResult<HashMap<String, Value>> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), json_to_value(v)))
            .collect()),
        other => Err(FirestoreError::invalid_document(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize document fields into a record, ignoring `skip` keys.
pub fn from_fields<T: for<'de> Deserialize<'de>>(
    fields: &HashMap<String, Value>,
    skip: &[&str],
) -> FirestoreResult<T> {
    let object: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect();
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_keep_their_kind() {
        assert_eq!(json_to_value(&json!(3)), Value::IntegerValue("3".into()));
        assert_eq!(json_to_value(&json!(3.0)), Value::DoubleValue(3.0));
        assert_eq!(json_to_value(&json!(4.5)), Value::DoubleValue(4.5));
        assert_eq!(value_to_json(&Value::DoubleValue(7.533333)), json!(7.533333));
    }

    #[test]
    fn test_nested_structures() {
        let original = json!({
            "images": [{"scene_number": 1, "key": "alice/images/a.png"}],
            "video": {"duration_sec": 12.25, "video_key": "v"},
            "error": null
        });
        let value = json_to_value(&original);
        assert_eq!(value_to_json(&value), original);
    }

    #[test]
    fn test_value_wire_format() {
        let encoded = serde_json::to_value(Value::IntegerValue("5".into())).unwrap();
        assert_eq!(encoded, json!({"integerValue": "5"}));
        let decoded: Value = serde_json::from_value(json!({"doubleValue": 1.5})).unwrap();
        assert_eq!(decoded, Value::DoubleValue(1.5));
        let empty: Value = serde_json::from_value(json!({"arrayValue": {}})).unwrap();
        assert_eq!(value_to_json(&empty), json!([]));
    }

    #[test]
    fn test_from_fields_skips_keys() {
        let mut fields = HashMap::new();
        fields.insert("a".to_string(), Value::StringValue("x".into()));
        fields.insert("expires_at".to_string(), Value::TimestampValue("t".into()));

        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct OnlyA {
            a: String,
        }
        let parsed: OnlyA = from_fields(&fields, &["expires_at"]).unwrap();
        assert_eq!(parsed.a, "x");
    }

    #[test]
    fn test_document_id() {
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/users/u/library/abc".into()),
            fields: None,
            create_time: None,
            update_time: None,
        };
        assert_eq!(doc.id(), Some("abc"));
    }
}
