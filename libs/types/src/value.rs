//! Dynamically-shaped stream values
//!
//! A [`Value`] is what producers hand to an output stream: a partial, possibly
//! nested datum whose shape is only known at runtime. The variant set is
//! closed so that [`crate::stitch`] can match on it exhaustively.
//!
//! On the wire a value looks like a plain JSON document: records and maps
//! become objects, enums become their tag string and opaque bytes become an
//! array of numbers. Type names of records and enums are not transmitted.

use crate::ValueError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A partial, dynamically-shaped datum
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / not yet populated
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Opaque scalar payload
    Bytes(Vec<u8>),
    Text(String),
    List(Vec<Value>),
    /// Key-value mapping; key order is irrelevant
    Map(BTreeMap<String, Value>),
    /// Member of a fixed, string-valued enumeration
    Enum(EnumValue),
    /// Instance of a named record type with a fixed field set
    Record(Record),
}

/// Discriminant of a [`Value`], used for logging and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Bytes,
    Text,
    List,
    Map,
    Enum,
    Record,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bytes => "bytes",
            ValueKind::Text => "text",
            ValueKind::List => "list",
            ValueKind::Map => "map",
            ValueKind::Enum => "enum",
            ValueKind::Record => "record",
        };
        f.write_str(name)
    }
}

/// A tagged enumeration member, e.g. `Role::Assistant` carried as `"assistant"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    type_name: String,
    tag: String,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            tag: tag.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// An instance of a named record type
///
/// Fields keep declaration order. Two records are of the same type when their
/// type names match.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field setter; replaces an existing field of the same name
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(String, Value)> {
        self.fields
    }

    /// Drop the type name and expose the fields as a mapping
    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.fields.into_iter().collect()
    }
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a list value
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::List(items.into_iter().collect())
    }

    /// Build an enum member value
    pub fn enumeration(type_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Value::Enum(EnumValue::new(type_name, tag))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Text(_) => ValueKind::Text,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Enum(_) => ValueKind::Enum,
            Value::Record(_) => ValueKind::Record,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value carries meaningful information
    ///
    /// Null, `false`, zero, and empty text/bytes/lists/maps are falsy. Enum
    /// members are truthy when their tag is non-empty; records always are.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Bytes(bytes) => !bytes.is_empty(),
            Value::Text(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Enum(member) => !member.tag.is_empty(),
            Value::Record(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Field lookup on maps and records
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::Record(record) => record.field(key),
            _ => None,
        }
    }

    /// Fields of a map or record as an owned mapping
    pub fn into_mapping(self) -> Result<BTreeMap<String, Value>, Value> {
        match self {
            Value::Map(map) => Ok(map),
            Value::Record(record) => Ok(record.into_map()),
            other => Err(other),
        }
    }

    /// Encode any serializable type as a value
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ValueError> {
        serde_json::to_value(value)
            .map(Value::from)
            .map_err(|e| ValueError::encode(e.to_string()))
    }

    /// Decode this value into a typed struct
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        let json = serde_json::Value::from(self.clone());
        serde_json::from_value(json)
            .map_err(|e| ValueError::decode(std::any::type_name::<T>(), e.to_string()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<EnumValue> for Value {
    fn from(member: EnumValue) -> Self {
        Value::Enum(member)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            // Non-finite floats have no JSON representation and map to null
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Bytes(bytes) => serde_json::Value::from(bytes),
            Value::Text(text) => serde_json::Value::String(text),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Enum(member) => serde_json::Value::String(member.tag),
            Value::Record(record) => serde_json::Value::Object(
                record
                    .into_fields()
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) => serializer.serialize_unit(),
            Value::Bytes(bytes) => serializer.collect_seq(bytes),
            Value::Text(text) => serializer.serialize_str(text),
            Value::List(items) => serializer.collect_seq(items),
            Value::Map(map) => serializer.collect_map(map),
            Value::Enum(member) => serializer.serialize_str(&member.tag),
            Value::Record(record) => {
                serializer.collect_map(record.fields.iter().map(|(k, v)| (k, v)))
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::list([]).is_truthy());
        assert!(!Value::Map(BTreeMap::new()).is_truthy());
        assert!(!Value::Bytes(Vec::new()).is_truthy());

        assert!(Value::from(true).is_truthy());
        assert!(Value::from(-3).is_truthy());
        assert!(Value::from(f64::NAN).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::enumeration("Role", "user").is_truthy());
        assert!(!Value::enumeration("Role", "").is_truthy());
        assert!(Value::Record(Record::new("Empty")).is_truthy());
    }

    #[test]
    fn test_record_fields_keep_declaration_order() {
        let record = Record::new("Output")
            .with_field("text", "hi")
            .with_field("count", 2)
            .with_field("text", "replaced");

        let names: Vec<&str> = record.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["text", "count"]);
        assert_eq!(record.field("text"), Some(&Value::from("replaced")));
    }

    #[test]
    fn test_serializes_like_a_model_dump() {
        let value = Value::Record(
            Record::new("Output")
                .with_field("role", Value::enumeration("Role", "assistant"))
                .with_field("parts", Value::list([Value::from("a"), Value::Null]))
                .with_field("score", 0.5),
        );

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "assistant", "parts": ["a", null], "score": 0.5})
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let value: Value = serde_json::from_str(r#"{"a": [1, 2.5, "x", true, null]}"#).unwrap();
        assert_eq!(
            value,
            Value::map([(
                "a",
                Value::list([
                    Value::Int(1),
                    Value::Float(2.5),
                    Value::from("x"),
                    Value::Bool(true),
                    Value::Null,
                ])
            )])
        );
    }

    #[test]
    fn test_typed_bridge() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Usage {
            prompt_tokens: i64,
            model: String,
        }

        let usage = Usage {
            prompt_tokens: 12,
            model: "tiny".to_string(),
        };
        let value = Value::from_serialize(&usage).unwrap();
        assert_eq!(value.get("prompt_tokens"), Some(&Value::Int(12)));

        let back: Usage = value.deserialize_into().unwrap();
        assert_eq!(back, usage);

        let err = Value::map([("model", Value::from("tiny"))])
            .deserialize_into::<Usage>()
            .unwrap_err();
        assert!(matches!(err, ValueError::Decode { .. }));
    }

    #[test]
    fn test_into_mapping() {
        let record = Value::Record(Record::new("R").with_field("x", 1));
        let map = record.into_mapping().unwrap();
        assert_eq!(map.get("x"), Some(&Value::Int(1)));

        assert_eq!(Value::from("s").into_mapping(), Err(Value::from("s")));
    }
}
