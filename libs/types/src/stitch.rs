//! Stitch merge engine
//!
//! Folds successive partial values of an evolving structured object into one.
//! Later chunks only add information: fields that are not yet populated are
//! null, text is a continuation of what came before, and a later empty or zero
//! scalar never erases an earlier meaningful one.
//!
//! Rules, first match wins:
//!
//! 1. null on either side yields the other side
//! 2. records of the same type merge field by field
//! 3. maps merge over the union of their keys
//! 4. lists merge index by index, the shorter side padded with null
//! 5. enums keep the left member if the tags agree, otherwise the right one
//! 6. text is concatenated, left first
//! 7. anything else: the right side if truthy, otherwise the left side

use crate::value::{Record, Value};
use std::collections::BTreeMap;

/// Merge two partial values into one
///
/// Total and deterministic over every shape pair. Both operands are consumed;
/// the result shares no structure with any other live value.
pub fn stitch(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Null, right) => right,
        (left, Value::Null) => left,
        (Value::Record(left), Value::Record(right)) if left.type_name() == right.type_name() => {
            Value::Record(stitch_records(left, right))
        }
        (Value::Map(left), Value::Map(right)) => Value::Map(stitch_maps(left, right)),
        (Value::List(left), Value::List(right)) => Value::List(stitch_lists(left, right)),
        (Value::Enum(left), Value::Enum(right)) => {
            if left.tag() == right.tag() {
                Value::Enum(left)
            } else {
                Value::Enum(right)
            }
        }
        (Value::Text(mut left), Value::Text(right)) => {
            left.push_str(&right);
            Value::Text(left)
        }
        (left, right) => {
            if right.is_truthy() {
                right
            } else {
                left
            }
        }
    }
}

fn stitch_records(left: Record, right: Record) -> Record {
    let mut merged = Record::new(left.type_name());
    let mut right_fields = right.into_fields();

    for (name, value) in left.into_fields() {
        let other = match right_fields.iter().position(|(n, _)| *n == name) {
            Some(index) => right_fields.remove(index).1,
            None => Value::Null,
        };
        merged.set_field(name, stitch(value, other));
    }

    // Only reachable when two instances of one type disagree on their fields
    for (name, value) in right_fields {
        merged.set_field(name, value);
    }

    merged
}

fn stitch_maps(
    mut left: BTreeMap<String, Value>,
    right: BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    for (key, value) in right {
        let merged = match left.remove(&key) {
            Some(existing) => stitch(existing, value),
            None => value,
        };
        left.insert(key, merged);
    }
    left
}

fn stitch_lists(left: Vec<Value>, right: Vec<Value>) -> Vec<Value> {
    let mut merged = Vec::with_capacity(left.len().max(right.len()));
    let mut right = right.into_iter();

    for item in left {
        match right.next() {
            Some(other) => merged.push(stitch(item, other)),
            None => merged.push(item),
        }
    }
    merged.extend(right);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EnumValue;

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_null_is_identity() {
        assert_eq!(stitch(Value::Null, text("a")), text("a"));
        assert_eq!(stitch(text("a"), Value::Null), text("a"));
        assert_eq!(stitch(Value::Null, Value::Null), Value::Null);
    }

    #[test]
    fn test_text_concatenates_in_order() {
        assert_eq!(stitch(text("foo"), text("bar")), text("foobar"));
        assert_eq!(stitch(text(""), text("bar")), text("bar"));
    }

    #[test]
    fn test_maps_merge_over_key_union() {
        let merged = stitch(
            Value::map([("a", Value::from(1))]),
            Value::map([("b", Value::from(2))]),
        );
        assert_eq!(
            merged,
            Value::map([("a", Value::from(1)), ("b", Value::from(2))])
        );

        let merged = stitch(
            Value::map([("a", Value::from(1))]),
            Value::map([("a", Value::from(2)), ("b", Value::from(3))]),
        );
        assert_eq!(
            merged,
            Value::map([("a", Value::from(2)), ("b", Value::from(3))])
        );
    }

    #[test]
    fn test_map_null_entry_keeps_existing_value() {
        let merged = stitch(
            Value::map([("a", text("kept"))]),
            Value::map([("a", Value::Null)]),
        );
        assert_eq!(merged, Value::map([("a", text("kept"))]));
    }

    #[test]
    fn test_lists_merge_index_wise() {
        let merged = stitch(
            Value::list([Value::from(1)]),
            Value::list([Value::from(10), Value::from(20)]),
        );
        assert_eq!(merged, Value::list([Value::from(10), Value::from(20)]));

        let merged = stitch(
            Value::list([text("a"), text("b"), text("c")]),
            Value::list([text("x")]),
        );
        assert_eq!(merged, Value::list([text("ax"), text("b"), text("c")]));

        assert_eq!(
            stitch(Value::list([]), Value::list([text("a")])),
            Value::list([text("a")])
        );
    }

    #[test]
    fn test_scalars_keep_latest_truthy() {
        assert_eq!(stitch(Value::from(5), Value::from(0)), Value::from(5));
        assert_eq!(stitch(Value::from(5), Value::from(7)), Value::from(7));
        assert_eq!(stitch(Value::from(true), Value::from(false)), Value::from(true));
        assert_eq!(stitch(Value::from(0.0), Value::from(1.5)), Value::from(1.5));
    }

    #[test]
    fn test_mismatched_shapes_fall_back_to_truthiness() {
        assert_eq!(stitch(text("a"), Value::from(3)), Value::from(3));
        assert_eq!(stitch(text("a"), Value::list([])), text("a"));
        assert_eq!(
            stitch(Value::map([("k", text("v"))]), text("")),
            Value::map([("k", text("v"))])
        );
    }

    #[test]
    fn test_enum_latest_member_wins() {
        let a = Value::enumeration("Status", "running");
        let b = Value::enumeration("Status", "done");
        assert_eq!(stitch(a.clone(), a.clone()), a);
        assert_eq!(stitch(a, b.clone()), b);
    }

    #[test]
    fn test_enum_equal_tags_keep_left_member() {
        let left = Value::Enum(EnumValue::new("Status", "done"));
        let right = Value::Enum(EnumValue::new("OtherStatus", "done"));
        assert_eq!(stitch(left.clone(), right), left);
    }

    #[test]
    fn test_enum_and_text_do_not_concatenate() {
        let status = Value::enumeration("Status", "run");
        assert_eq!(stitch(status.clone(), text("ning")), text("ning"));
        assert_eq!(stitch(status.clone(), text("")), status);
        assert_eq!(stitch(text("state: "), status.clone()), status);
    }

    #[test]
    fn test_records_merge_field_wise() {
        let left = Record::new("Completion")
            .with_field("text", "Hel")
            .with_field("finish_reason", Value::Null)
            .with_field("tokens", Value::list([text("Hel")]));
        let right = Record::new("Completion")
            .with_field("text", "lo")
            .with_field("finish_reason", Value::enumeration("Finish", "stop"))
            .with_field("tokens", Value::list([Value::Null, text("lo")]));

        let merged = stitch(Value::Record(left), Value::Record(right));
        let record = merged.as_record().unwrap();

        assert_eq!(record.type_name(), "Completion");
        assert_eq!(record.field("text"), Some(&text("Hello")));
        assert_eq!(
            record.field("finish_reason"),
            Some(&Value::enumeration("Finish", "stop"))
        );
        assert_eq!(
            record.field("tokens"),
            Some(&Value::list([text("Hel"), text("lo")]))
        );
        let names: Vec<&str> = record.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["text", "finish_reason", "tokens"]);
    }

    #[test]
    fn test_records_of_different_types_do_not_merge() {
        let left = Value::Record(Record::new("A").with_field("x", "1"));
        let right = Value::Record(Record::new("B").with_field("x", "2"));
        assert_eq!(stitch(left, right.clone()), right);
    }

    #[test]
    fn test_nested_stream_of_chunks() {
        let chunks = vec![
            Value::map([(
                "choices",
                Value::list([Value::map([("text", text("The"))])]),
            )]),
            Value::map([(
                "choices",
                Value::list([Value::map([("text", text(" quick"))])]),
            )]),
            Value::map([
                (
                    "choices",
                    Value::list([Value::map([
                        ("text", text(" fox")),
                        ("index", Value::from(0)),
                    ])]),
                ),
                ("usage", Value::map([("total", Value::from(3))])),
            ]),
        ];

        let merged = chunks.into_iter().fold(Value::Null, stitch);
        assert_eq!(
            merged,
            Value::map([
                (
                    "choices",
                    Value::list([Value::map([
                        ("text", text("The quick fox")),
                        ("index", Value::from(0)),
                    ])]),
                ),
                ("usage", Value::map([("total", Value::from(3))])),
            ])
        );
    }
}
