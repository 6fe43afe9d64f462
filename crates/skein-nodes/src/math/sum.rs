//! Sum node
//!
//! Adds up a list of integers. The empty list sums to zero.

use async_trait::async_trait;
use serde_json::{json, Value};
use skein_compose::{ComposeError, FlowNode, Result, RunContext, ValueType};

/// Sum Node
///
/// Consumes a list of integers and produces their sum.
///
/// # Input
/// `list<integer>` - the values to add
///
/// # Output
/// `integer` - the sum
#[derive(Debug, Clone, Default)]
pub struct SumNode;

impl SumNode {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FlowNode for SumNode {
    fn input_type(&self) -> ValueType {
        ValueType::list(ValueType::Integer)
    }

    fn output_type(&self) -> ValueType {
        ValueType::Integer
    }

    async fn invoke(&self, _ctx: &RunContext, input: Value) -> Result<Value> {
        let items = input
            .as_array()
            .ok_or_else(|| ComposeError::InvalidInput("expected a list of integers".to_string()))?;

        let mut total: i64 = 0;
        for (index, item) in items.iter().enumerate() {
            let n = item.as_i64().ok_or_else(|| {
                ComposeError::InvalidInput(format!("element {} is not an integer", index))
            })?;
            total += n;
        }

        log::debug!("SumNode: {} values -> {}", items.len(), total);
        Ok(json!(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sums_values() {
        let node = SumNode::new();
        let ctx = RunContext::new();
        let output = node.invoke(&ctx, json!([1, 2, 3, 4])).await.unwrap();
        assert_eq!(output, json!(10));
    }

    #[tokio::test]
    async fn test_empty_list_is_zero() {
        let node = SumNode::new();
        let ctx = RunContext::new();
        let output = node.invoke(&ctx, json!([])).await.unwrap();
        assert_eq!(output, json!(0));
    }

    #[tokio::test]
    async fn test_rejects_non_integer_element() {
        let node = SumNode::new();
        let ctx = RunContext::new();
        let err = node.invoke(&ctx, json!([1, "two", 3])).await.unwrap_err();
        assert!(matches!(err, ComposeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_list() {
        let node = SumNode::new();
        let ctx = RunContext::new();
        let err = node.invoke(&ctx, json!(7)).await.unwrap_err();
        assert!(matches!(err, ComposeError::InvalidInput(_)));
    }
}
