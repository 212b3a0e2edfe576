//! Firestore REST wire types and conversions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};

/// Firestore document field value.
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
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(name))
    }

    /// Read a typed field; `None` when missing, null or of another type.
    pub fn get<T: FromFirestoreValue>(&self, name: &str) -> Option<T> {
        self.field(name).and_then(T::from_firestore_value)
    }
}

/// Convert a Rust value to a Firestore value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u8 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl ToFirestoreValue for Json {
    fn to_firestore_value(&self) -> Value {
        json_to_value(self)
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Convert a Firestore value to a Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        i64::from_firestore_value(value).and_then(|n| u32::try_from(n).ok())
    }
}

impl FromFirestoreValue for u8 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        i64::from_firestore_value(value).and_then(|n| u8::try_from(n).ok())
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) | Value::StringValue(s) => {
                DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into())
            }
            _ => None,
        }
    }
}

impl FromFirestoreValue for Json {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        Some(value_to_json(value))
    }
}

/// Encode arbitrary JSON as a Firestore value.
///
/// Integers that fit in `i64` become `integerValue`; other numbers are doubles.
pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::NullValue(()),
        Json::Bool(b) => Value::BooleanValue(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::IntegerValue(i.to_string()),
            None => Value::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Json::String(s) => Value::StringValue(s.clone()),
        Json::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_value).collect()),
        }),
        Json::Object(map) => Value::MapValue(MapValue {
            fields: Some(json_object_to_fields(map)),
        }),
    }
}

pub fn json_object_to_fields(map: &Map<String, Json>) -> HashMap<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect()
}

/// Decode a Firestore value back to JSON. Timestamps come back as RFC 3339 strings.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::NullValue(()) => Json::Null,
        Value::BooleanValue(b) => Json::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(|i| Json::Number(i.into()))
            .unwrap_or_else(|_| Json::String(s.clone())),
        Value::DoubleValue(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::TimestampValue(s) | Value::StringValue(s) => Json::String(s.clone()),
        Value::ArrayValue(a) => Json::Array(
            a.values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(value_to_json)
                .collect(),
        ),
        Value::MapValue(m) => Json::Object(fields_to_json_object(m.fields.as_ref())),
    }
}

pub fn fields_to_json_object(fields: Option<&HashMap<String, Value>>) -> Map<String, Json> {
    fields
        .map(|f| f.iter().map(|(k, v)| (k.clone(), value_to_json(v))).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let encoded = serde_json::to_value(json_to_value(&json!({"seconds": 65, "ok": true}))).unwrap();
        assert_eq!(encoded["mapValue"]["fields"]["seconds"], json!({"integerValue": "65"}));
        assert_eq!(encoded["mapValue"]["fields"]["ok"], json!({"booleanValue": true}));

        let null: Value = serde_json::from_value(json!({"nullValue": null})).unwrap();
        assert_eq!(null, Value::NullValue(()));
    }

    #[test]
    fn test_nested_payload_survives_conversion() {
        let payload = json!({
            "show_info": {"id": 1396, "name": "Breaking Bad", "vote_average": 8.9},
            "episode_info": {"name": "Ozymandias", "crew": []},
            "tags": ["drama", null]
        });
        assert_eq!(value_to_json(&json_to_value(&payload)), payload);
    }

    #[test]
    fn test_empty_containers_from_wire() {
        let v: Value = serde_json::from_value(json!({"arrayValue": {}})).unwrap();
        assert_eq!(value_to_json(&v), json!([]));
        let v: Value = serde_json::from_value(json!({"mapValue": {}})).unwrap();
        assert_eq!(value_to_json(&v), json!({}));
    }

    #[test]
    fn test_typed_reads() {
        let mut fields = HashMap::new();
        fields.insert("progress".to_string(), 45u8.to_firestore_value());
        fields.insert("title".to_string(), Value::NullValue(()));
        fields.insert("at".to_string(), Value::TimestampValue("2024-05-01T10:00:00Z".into()));
        let doc = Document::new(fields);

        assert_eq!(doc.get::<u8>("progress"), Some(45));
        assert_eq!(doc.get::<String>("title"), None);
        assert!(doc.get::<DateTime<Utc>>("at").is_some());
        assert_eq!(doc.get::<u32>("missing"), None);
    }
}
