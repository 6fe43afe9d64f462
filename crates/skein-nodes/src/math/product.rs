//! Product node
//!
//! Multiplies two integers arriving on named fields, the shape fan-in
//! wiring produces when two upstream results meet at one node.

use async_trait::async_trait;
use serde_json::{json, Value};
use skein_compose::{ComposeError, FieldDef, FlowNode, Result, RunContext, ValueType};

/// Product Node
///
/// Consumes a record with two integer fields and produces their product.
///
/// # Input
/// `record{a: integer, b: integer}` - the factors
///
/// # Output
/// `integer` - the product
#[derive(Debug, Clone, Default)]
pub struct ProductNode;

impl ProductNode {
    /// Field name for the first factor
    pub const FIELD_A: &'static str = "a";
    /// Field name for the second factor
    pub const FIELD_B: &'static str = "b";

    pub fn new() -> Self {
        Self
    }

    fn factor(input: &Value, field: &str) -> Result<i64> {
        input
            .get(field)
            .and_then(Value::as_i64)
            .ok_or_else(|| ComposeError::InvalidInput(format!("field '{}' is not an integer", field)))
    }
}

#[async_trait]
impl FlowNode for ProductNode {
    fn input_type(&self) -> ValueType {
        ValueType::record(vec![
            FieldDef::required(Self::FIELD_A, ValueType::Integer),
            FieldDef::required(Self::FIELD_B, ValueType::Integer),
        ])
    }

    fn output_type(&self) -> ValueType {
        ValueType::Integer
    }

    async fn invoke(&self, _ctx: &RunContext, input: Value) -> Result<Value> {
        let a = Self::factor(&input, Self::FIELD_A)?;
        let b = Self::factor(&input, Self::FIELD_B)?;
        Ok(json!(a * b))
    }
}
