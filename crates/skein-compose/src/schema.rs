//! Type descriptors for node inputs and outputs
//!
//! Every node declares the shape of its input and output as a [`ValueType`].
//! Descriptors are plain data carried alongside the node; the compiler checks
//! field mappings against them, so no type inspection happens while a run is
//! in flight.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared type of a value flowing between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Accepts or produces any value
    Any,
    /// Boolean value
    Boolean,
    /// Signed integer
    Integer,
    /// Floating-point number (integers widen into this)
    Number,
    /// Text string
    Text,
    /// Homogeneous list
    List(Box<ValueType>),
    /// Structured record with named fields
    Record(RecordSchema),
}

/// Named-field schema for a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Field definitions in declaration order
    pub fields: Vec<FieldDef>,
}

/// A single named field in a record schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type of the field
    pub field_type: ValueType,
    /// Whether the field must be populated
    pub required: bool,
}

impl FieldDef {
    /// Create a required field
    pub fn required(name: impl Into<String>, field_type: ValueType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create an optional field
    pub fn optional(name: impl Into<String>, field_type: ValueType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }
}

impl RecordSchema {
    /// Create a schema from field definitions
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that must be populated
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.required)
    }
}

impl ValueType {
    /// Convenience constructor for a record type
    pub fn record(fields: Vec<FieldDef>) -> Self {
        Self::Record(RecordSchema::new(fields))
    }

    /// Convenience constructor for a list type
    pub fn list(element: ValueType) -> Self {
        Self::List(Box::new(element))
    }

    /// Record schema, if this is a record type
    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self {
            Self::Record(schema) => Some(schema),
            _ => None,
        }
    }

    /// Check whether a value of this type can be assigned where `target` is
    /// expected
    ///
    /// `Any` is assignable in both directions, integers widen to numbers,
    /// lists are covariant in their element type, and records are checked
    /// structurally: every field the target declares must be satisfiable by
    /// the source, and a required target field cannot be fed by an optional
    /// source field.
    pub fn is_assignable_to(&self, target: &ValueType) -> bool {
        match (self, target) {
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Integer, Self::Number) => true,
            (Self::List(a), Self::List(b)) => a.is_assignable_to(b),
            (Self::Record(src), Self::Record(dst)) => dst.fields.iter().all(|want| {
                match src.field(&want.name) {
                    Some(have) => {
                        have.field_type.is_assignable_to(&want.field_type)
                            && (!want.required || have.required)
                    }
                    None => !want.required,
                }
            }),
            _ => self == target,
        }
    }

    /// Check whether a concrete value has this declared shape
    ///
    /// Used once per run on the external input; everything downstream is
    /// covered by compile-time mapping checks.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Text => value.is_string(),
            Self::List(element) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| element.matches(v))),
            Self::Record(schema) => match value.as_object() {
                Some(map) => schema.fields.iter().all(|f| match map.get(&f.name) {
                    Some(v) => f.field_type.matches(v),
                    None => !f.required,
                }),
                None => false,
            },
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::Text => write!(f, "text"),
            Self::List(element) => write!(f, "list<{element}>"),
            Self::Record(schema) => {
                let names: Vec<&str> = schema.fields.iter().map(|fd| fd.name.as_str()).collect();
                write!(f, "record{{{}}}", names.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_is_assignable_both_ways() {
        assert!(ValueType::Any.is_assignable_to(&ValueType::Text));
        assert!(ValueType::Text.is_assignable_to(&ValueType::Any));
    }

    #[test]
    fn test_integer_widens_to_number() {
        assert!(ValueType::Integer.is_assignable_to(&ValueType::Number));
        assert!(!ValueType::Number.is_assignable_to(&ValueType::Integer));
    }

    #[test]
    fn test_list_covariance() {
        let ints = ValueType::list(ValueType::Integer);
        let numbers = ValueType::list(ValueType::Number);
        assert!(ints.is_assignable_to(&numbers));
        assert!(!numbers.is_assignable_to(&ints));
    }

    #[test]
    fn test_record_structural_assignability() {
        let source = ValueType::record(vec![
            FieldDef::required("a", ValueType::Integer),
            FieldDef::required("b", ValueType::Text),
            FieldDef::optional("extra", ValueType::Boolean),
        ]);
        let target = ValueType::record(vec![
            FieldDef::required("a", ValueType::Number),
            FieldDef::optional("b", ValueType::Text),
        ]);
        assert!(source.is_assignable_to(&target));

        // A required target field cannot come from an optional source field
        let weak_source = ValueType::record(vec![FieldDef::optional("a", ValueType::Integer)]);
        let strict_target = ValueType::record(vec![FieldDef::required("a", ValueType::Integer)]);
        assert!(!weak_source.is_assignable_to(&strict_target));
    }

    #[test]
    fn test_matches_scalars() {
        assert!(ValueType::Integer.matches(&json!(5)));
        assert!(!ValueType::Integer.matches(&json!(5.5)));
        assert!(ValueType::Number.matches(&json!(5.5)));
        assert!(ValueType::Number.matches(&json!(5)));
        assert!(ValueType::Text.matches(&json!("hi")));
        assert!(!ValueType::Text.matches(&json!(null)));
        assert!(ValueType::Any.matches(&json!(null)));
    }

    #[test]
    fn test_matches_nested() {
        let ty = ValueType::record(vec![
            FieldDef::required("values", ValueType::list(ValueType::Integer)),
            FieldDef::optional("label", ValueType::Text),
        ]);
        assert!(ty.matches(&json!({ "values": [1, 2, 3] })));
        assert!(ty.matches(&json!({ "values": [], "label": "x" })));
        assert!(!ty.matches(&json!({ "values": [1, "two"] })));
        assert!(!ty.matches(&json!({ "label": "missing values" })));
    }

    #[test]
    fn test_display() {
        let ty = ValueType::record(vec![
            FieldDef::required("a", ValueType::Integer),
            FieldDef::required("b", ValueType::list(ValueType::Text)),
        ]);
        assert_eq!(ty.to_string(), "record{a, b}");
        assert_eq!(
            ValueType::list(ValueType::Number).to_string(),
            "list<number>"
        );
    }
}
