//! Target shapes
//!
//! A target shape turns the accumulated field mapping of a stream into its
//! final typed result when the stream is finalized.

use crate::error::ShapeError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use types::{Record, Value, ValueKind};

/// Constructor for the final typed result of a stream
pub trait TargetShape: Send + Sync + fmt::Debug {
    /// Name used in errors and logs
    fn name(&self) -> &str;

    /// Whether `value` already is an instance of this shape
    fn is_instance(&self, value: &Value) -> bool;

    /// Build an instance from a field mapping
    fn construct(&self, fields: &BTreeMap<String, Value>) -> Result<Value, ShapeError>;
}

/// Convert an accumulator into `shape`
///
/// Instances pass through unchanged; maps and records are rebuilt from their
/// fields. The accumulator itself is never modified.
pub(crate) fn conform(shape: &dyn TargetShape, accumulated: Option<&Value>) -> Result<Value, ShapeError> {
    match accumulated {
        Some(value) if shape.is_instance(value) => Ok(value.clone()),
        Some(Value::Map(fields)) => shape.construct(fields),
        Some(Value::Record(record)) => shape.construct(&record.clone().into_map()),
        Some(other) => Err(ShapeError::NotAMapping {
            shape: shape.name().to_string(),
            found: other.kind(),
        }),
        None => Err(ShapeError::NotAMapping {
            shape: shape.name().to_string(),
            found: ValueKind::Null,
        }),
    }
}

/// One declared field of a [`RecordSchema`]
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
    /// Used when an optional field is absent or null
    pub default: Value,
}

/// Declarative record type
///
/// A required field must be present and non-null. Fields not declared in the
/// schema are rejected unless [`RecordSchema::allow_unknown_fields`] was set,
/// in which case they are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    type_name: String,
    fields: Vec<FieldSpec>,
    allow_unknown: bool,
}

impl RecordSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
            allow_unknown: false,
        }
    }

    /// Declare a required field
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            required: true,
            default: Value::Null,
        });
        self
    }

    /// Declare an optional field with its default
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            required: false,
            default: default.into(),
        });
        self
    }

    pub fn allow_unknown_fields(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

impl TargetShape for RecordSchema {
    fn name(&self) -> &str {
        &self.type_name
    }

    fn is_instance(&self, value: &Value) -> bool {
        value
            .as_record()
            .is_some_and(|record| record.type_name() == self.type_name)
    }

    fn construct(&self, fields: &BTreeMap<String, Value>) -> Result<Value, ShapeError> {
        if !self.allow_unknown {
            if let Some(unknown) = fields
                .keys()
                .find(|key| !self.fields.iter().any(|spec| &spec.name == *key))
            {
                return Err(ShapeError::UnknownField {
                    shape: self.type_name.clone(),
                    field: unknown.clone(),
                });
            }
        }

        let mut record = Record::new(&self.type_name);
        for spec in &self.fields {
            let value = match fields.get(&spec.name) {
                Some(value) if !value.is_null() => value.clone(),
                _ if spec.required => {
                    return Err(ShapeError::MissingField {
                        shape: self.type_name.clone(),
                        field: spec.name.clone(),
                    })
                }
                _ => spec.default.clone(),
            };
            record.set_field(&spec.name, value);
        }
        Ok(Value::Record(record))
    }
}

/// Target shape backed by a serde type
///
/// Construction deserializes the fields into `T`, so serde's own validation
/// (missing fields, wrong types) applies, then re-encodes `T` as a record
/// named after it.
pub struct SerdeShape<T> {
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> SerdeShape<T> {
    /// Shape named after the last path segment of `T`
    pub fn new() -> Self {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let name = base.rsplit("::").next().unwrap_or(base);
        Self::named(name)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Decode a finalized value back into `T`
    pub fn decode(&self, value: &Value) -> Result<T, ShapeError> {
        value.deserialize_into().map_err(|e| self.construction_error(e))
    }

    fn construction_error(&self, err: impl fmt::Display) -> ShapeError {
        ShapeError::Construction {
            shape: self.name.clone(),
            message: err.to_string(),
        }
    }
}

impl<T: Serialize + DeserializeOwned> Default for SerdeShape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SerdeShape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeShape").field("name", &self.name).finish()
    }
}

impl<T: Serialize + DeserializeOwned> TargetShape for SerdeShape<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_instance(&self, value: &Value) -> bool {
        value
            .as_record()
            .is_some_and(|record| record.type_name() == self.name)
    }

    fn construct(&self, fields: &BTreeMap<String, Value>) -> Result<Value, ShapeError> {
        let typed: T = self.decode(&Value::Map(fields.clone()))?;
        let encoded = Value::from_serialize(&typed).map_err(|e| self.construction_error(e))?;

        match encoded.into_mapping() {
            Ok(map) => {
                let record = map
                    .into_iter()
                    .fold(Record::new(&self.name), |record, (name, value)| {
                        record.with_field(name, value)
                    });
                Ok(Value::Record(record))
            }
            // Not a struct-like type; keep the encoded value as is
            Err(other) => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn completion_schema() -> RecordSchema {
        RecordSchema::new("Completion")
            .required("text")
            .optional("finish_reason", "length")
    }

    #[test]
    fn test_schema_builds_record_in_declared_order() {
        let fields = Value::map([("finish_reason", Value::from("stop")), ("text", Value::from("hi"))]);
        let built = completion_schema()
            .construct(fields.as_map().unwrap())
            .unwrap();

        let record = built.as_record().unwrap();
        assert_eq!(record.type_name(), "Completion");
        let names: Vec<&str> = record.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["text", "finish_reason"]);
    }

    #[test]
    fn test_schema_applies_defaults() {
        let fields = Value::map([("text", Value::from("hi"))]);
        let built = completion_schema().construct(fields.as_map().unwrap()).unwrap();
        assert_eq!(built.get("finish_reason"), Some(&Value::from("length")));
    }

    #[test]
    fn test_schema_missing_and_null_required_field() {
        let schema = completion_schema();
        let err = schema.construct(&BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            ShapeError::MissingField {
                shape: "Completion".into(),
                field: "text".into()
            }
        );

        let fields = Value::map([("text", Value::Null)]);
        assert!(matches!(
            schema.construct(fields.as_map().unwrap()),
            Err(ShapeError::MissingField { .. })
        ));
    }

    #[test]
    fn test_schema_unknown_fields() {
        let fields = Value::map([("text", Value::from("hi")), ("extra", Value::from(1))]);
        assert!(matches!(
            completion_schema().construct(fields.as_map().unwrap()),
            Err(ShapeError::UnknownField { field, .. }) if field == "extra"
        ));

        let lenient = completion_schema().allow_unknown_fields();
        let built = lenient.construct(fields.as_map().unwrap()).unwrap();
        assert_eq!(built.get("extra"), None);
    }

    #[test]
    fn test_conform_passes_instances_through() {
        let schema = completion_schema();
        let instance = schema
            .construct(Value::map([("text", Value::from("x"))]).as_map().unwrap())
            .unwrap();
        assert_eq!(conform(&schema, Some(&instance)).unwrap(), instance);
    }

    #[test]
    fn test_conform_rejects_non_mappings() {
        let schema = completion_schema();
        assert_eq!(
            conform(&schema, Some(&Value::from("text"))),
            Err(ShapeError::NotAMapping {
                shape: "Completion".into(),
                found: ValueKind::Text
            })
        );
        assert!(matches!(
            conform(&schema, None),
            Err(ShapeError::NotAMapping { found: ValueKind::Null, .. })
        ));
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Summary {
        title: String,
        words: u32,
    }

    #[test]
    fn test_serde_shape_round_trip() {
        let shape = SerdeShape::<Summary>::new();
        assert_eq!(shape.name(), "Summary");

        let fields = Value::map([("title", Value::from("Fox")), ("words", Value::from(3))]);
        let built = shape.construct(fields.as_map().unwrap()).unwrap();
        assert!(shape.is_instance(&built));
        assert_eq!(
            shape.decode(&built).unwrap(),
            Summary {
                title: "Fox".into(),
                words: 3
            }
        );
    }

    #[test]
    fn test_serde_shape_reports_missing_fields() {
        let shape = SerdeShape::<Summary>::new();
        let fields = Value::map([("title", Value::from("Fox"))]);
        match shape.construct(fields.as_map().unwrap()) {
            Err(ShapeError::Construction { shape, message }) => {
                assert_eq!(shape, "Summary");
                assert!(message.contains("words"));
            }
            other => panic!("expected construction error, got {:?}", other),
        }
    }
}
