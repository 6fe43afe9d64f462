//! Field-level wiring between node outputs and node inputs.
//!
//! A data edge carries zero or more [`FieldMapping`]s describing which part of
//! the source's output lands where in the target's input. An edge with no
//! mappings routes the whole output to the whole input. During compilation
//! each mapping is checked against the declared types on both ends and frozen
//! into a [`ResolvedAssignment`]; at run time the executor replays the
//! assignments against completed outputs to assemble each node's input value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ComposeError, Result};
use crate::schema::ValueType;

/// Routing rule for one data edge
///
/// `None` on either side means "the whole value". The four constructors cover
/// the combinations:
///
/// - [`FieldMapping::whole`]: entire output becomes the entire input
/// - [`FieldMapping::from_field`]: one output field becomes the entire input
/// - [`FieldMapping::to_field`]: entire output becomes one input field
/// - [`FieldMapping::fields`]: one output field becomes one input field
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Field to select from the source output, or the whole output
    pub source_field: Option<String>,
    /// Field to populate on the target input, or the whole input
    pub target_field: Option<String>,
}

impl FieldMapping {
    /// Route the entire source output to the entire target input
    pub fn whole() -> Self {
        Self {
            source_field: None,
            target_field: None,
        }
    }

    /// Route one field of the source output to the entire target input
    pub fn from_field(source_field: impl Into<String>) -> Self {
        Self {
            source_field: Some(source_field.into()),
            target_field: None,
        }
    }

    /// Route the entire source output to one field of the target input
    pub fn to_field(target_field: impl Into<String>) -> Self {
        Self {
            source_field: None,
            target_field: Some(target_field.into()),
        }
    }

    /// Route one field of the source output to one field of the target input
    pub fn fields(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: Some(source_field.into()),
            target_field: Some(target_field.into()),
        }
    }

    /// Human-readable form used in error messages and logs,
    /// e.g. `start.Multiply -> mul.B`
    pub fn describe(&self, source: &str, target: &str) -> String {
        let from = match &self.source_field {
            Some(field) => format!("{source}.{field}"),
            None => source.to_string(),
        };
        let to = match &self.target_field {
            Some(field) => format!("{target}.{field}"),
            None => target.to_string(),
        };
        format!("{from} -> {to}")
    }
}

/// A type-checked mapping, pinned to its source node
///
/// Produced by compilation and stored on the plan; the executor applies these
/// without any further type inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssignment {
    /// Node whose completed output supplies the value (`start` for the
    /// external input)
    pub source: String,
    /// Field selected from the source output, or the whole output
    pub source_field: Option<String>,
    /// Field written on the target input, or the whole input
    pub target_field: Option<String>,
}

impl ResolvedAssignment {
    /// Whether this assignment replaces the entire target input
    pub fn is_whole(&self) -> bool {
        self.target_field.is_none()
    }

    /// Pick the mapped value out of the source's completed output
    fn select(&self, target: &str, source_output: &Value) -> Result<Value> {
        match &self.source_field {
            None => Ok(source_output.clone()),
            Some(field) => source_output.get(field).cloned().ok_or_else(|| {
                ComposeError::node_failure(
                    target,
                    format!("output of '{}' has no field '{field}'", self.source),
                )
            }),
        }
    }
}

/// Check one mapping against the declared types on both ends of an edge
///
/// Selecting a field from a non-record type, naming a field the record does
/// not declare, or connecting incompatible types all fail with
/// [`ComposeError::TypeMismatch`]. A source or target typed
/// [`ValueType::Any`] is permissive: any field selection on it resolves to
/// `Any`.
pub(crate) fn resolve(
    source: &str,
    target: &str,
    source_type: &ValueType,
    target_type: &ValueType,
    mapping: &FieldMapping,
) -> Result<ResolvedAssignment> {
    let picked = match &mapping.source_field {
        None => source_type.clone(),
        Some(field) => field_type(source_type, field).ok_or_else(|| ComposeError::TypeMismatch {
            mapping: mapping.describe(source, target),
            detail: format!("source type {source_type} has no field '{field}'"),
        })?,
    };
    let expected = match &mapping.target_field {
        None => target_type.clone(),
        Some(field) => field_type(target_type, field).ok_or_else(|| ComposeError::TypeMismatch {
            mapping: mapping.describe(source, target),
            detail: format!("target type {target_type} has no field '{field}'"),
        })?,
    };
    if !picked.is_assignable_to(&expected) {
        return Err(ComposeError::TypeMismatch {
            mapping: mapping.describe(source, target),
            detail: format!("{picked} is not assignable to {expected}"),
        });
    }
    Ok(ResolvedAssignment {
        source: source.to_string(),
        source_field: mapping.source_field.clone(),
        target_field: mapping.target_field.clone(),
    })
}

fn field_type(ty: &ValueType, field: &str) -> Option<ValueType> {
    match ty {
        ValueType::Any => Some(ValueType::Any),
        ValueType::Record(schema) => schema.field(field).map(|f| f.field_type.clone()),
        _ => None,
    }
}

/// Assemble a node's input from the completed outputs of its data sources
///
/// Whole-value assignments replace the input; field assignments build up a
/// record. Compilation guarantees the two forms are never mixed on one target
/// and that every referenced source has finished, so failures here are limited
/// to `Any`-typed sources whose runtime value lacks a mapped field.
pub(crate) fn assemble_input(
    target: &str,
    assignments: &[ResolvedAssignment],
    outputs: &HashMap<String, Value>,
) -> Result<Value> {
    let mut input: Option<Value> = None;
    for assignment in assignments {
        let source_output = outputs.get(&assignment.source).ok_or_else(|| {
            ComposeError::node_failure(
                target,
                format!("output of '{}' is not available", assignment.source),
            )
        })?;
        let value = assignment.select(target, source_output)?;
        match &assignment.target_field {
            None => {
                input = Some(value);
            }
            Some(field) => {
                let slot = input.get_or_insert_with(|| Value::Object(Map::new()));
                match slot {
                    Value::Object(map) => {
                        map.insert(field.clone(), value);
                    }
                    _ => {
                        return Err(ComposeError::node_failure(
                            target,
                            format!("cannot write field '{field}' into a whole-value input"),
                        ));
                    }
                }
            }
        }
    }
    Ok(input.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;
    use serde_json::json;

    fn pair_record() -> ValueType {
        ValueType::record(vec![
            FieldDef::required("a", ValueType::Integer),
            FieldDef::required("b", ValueType::Text),
        ])
    }

    #[test]
    fn test_constructors() {
        assert_eq!(FieldMapping::whole(), FieldMapping::default());
        assert_eq!(
            FieldMapping::from_field("x").source_field.as_deref(),
            Some("x")
        );
        assert_eq!(FieldMapping::to_field("y").target_field.as_deref(), Some("y"));
        let both = FieldMapping::fields("x", "y");
        assert_eq!(both.source_field.as_deref(), Some("x"));
        assert_eq!(both.target_field.as_deref(), Some("y"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            FieldMapping::fields("out", "in").describe("a", "b"),
            "a.out -> b.in"
        );
        assert_eq!(FieldMapping::whole().describe("a", "b"), "a -> b");
    }

    #[test]
    fn test_resolve_whole_to_whole() {
        let ok = resolve(
            "a",
            "b",
            &ValueType::Integer,
            &ValueType::Number,
            &FieldMapping::whole(),
        );
        assert!(ok.is_ok());

        let err = resolve(
            "a",
            "b",
            &ValueType::Text,
            &ValueType::Integer,
            &FieldMapping::whole(),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_resolve_from_field() {
        let assignment = resolve(
            "a",
            "b",
            &pair_record(),
            &ValueType::Integer,
            &FieldMapping::from_field("a"),
        )
        .unwrap();
        assert_eq!(assignment.source, "a");
        assert_eq!(assignment.source_field.as_deref(), Some("a"));

        let err = resolve(
            "a",
            "b",
            &pair_record(),
            &ValueType::Integer,
            &FieldMapping::from_field("missing"),
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("has no field 'missing'"), "got: {text}");
    }

    #[test]
    fn test_resolve_to_field() {
        let assignment = resolve(
            "a",
            "b",
            &ValueType::Text,
            &pair_record(),
            &FieldMapping::to_field("b"),
        )
        .unwrap();
        assert_eq!(assignment.target_field.as_deref(), Some("b"));

        // Selecting a field on a scalar target is a mismatch
        let err = resolve(
            "a",
            "b",
            &ValueType::Text,
            &ValueType::Integer,
            &FieldMapping::to_field("b"),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_resolve_field_to_field_type_check() {
        // pair_record().b is text, so it cannot feed an integer field
        let target = ValueType::record(vec![FieldDef::required("n", ValueType::Integer)]);
        let err = resolve(
            "a",
            "b",
            &pair_record(),
            &target,
            &FieldMapping::fields("b", "n"),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::TypeMismatch { .. }));

        let ok = resolve(
            "a",
            "b",
            &pair_record(),
            &target,
            &FieldMapping::fields("a", "n"),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_resolve_any_is_permissive() {
        let assignment = resolve(
            "a",
            "b",
            &ValueType::Any,
            &ValueType::Integer,
            &FieldMapping::from_field("whatever"),
        )
        .unwrap();
        assert_eq!(assignment.source_field.as_deref(), Some("whatever"));
    }

    #[test]
    fn test_assemble_whole() {
        let assignments = vec![ResolvedAssignment {
            source: "a".to_string(),
            source_field: None,
            target_field: None,
        }];
        let mut outputs = HashMap::new();
        outputs.insert("a".to_string(), json!(42));
        let input = assemble_input("b", &assignments, &outputs).unwrap();
        assert_eq!(input, json!(42));
    }

    #[test]
    fn test_assemble_builds_record_from_fields() {
        let assignments = vec![
            ResolvedAssignment {
                source: "a".to_string(),
                source_field: Some("sum".to_string()),
                target_field: Some("x".to_string()),
            },
            ResolvedAssignment {
                source: "start".to_string(),
                source_field: None,
                target_field: Some("y".to_string()),
            },
        ];
        let mut outputs = HashMap::new();
        outputs.insert("a".to_string(), json!({ "sum": 7 }));
        outputs.insert("start".to_string(), json!(3));
        let input = assemble_input("b", &assignments, &outputs).unwrap();
        assert_eq!(input, json!({ "x": 7, "y": 3 }));
    }

    #[test]
    fn test_assemble_missing_runtime_field() {
        let assignments = vec![ResolvedAssignment {
            source: "a".to_string(),
            source_field: Some("gone".to_string()),
            target_field: None,
        }];
        let mut outputs = HashMap::new();
        outputs.insert("a".to_string(), json!({ "present": 1 }));
        let err = assemble_input("b", &assignments, &outputs).unwrap_err();
        assert!(matches!(err, ComposeError::NodeExecution { .. }));
    }
}
