//! Scale node
//!
//! Multiplies its input by a configured constant factor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skein_compose::{ComposeError, FlowNode, Result, RunContext, ValueType};

/// Configuration for the scale node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Constant multiplier applied to every input
    pub factor: i64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self { factor: 1 }
    }
}

/// Scale Node
///
/// Multiplies an integer input by a fixed factor.
///
/// # Input
/// `integer` - the value to scale
///
/// # Output
/// `integer` - input times the configured factor
#[derive(Debug, Clone, Default)]
pub struct ScaleNode {
    config: ScaleConfig,
}

impl ScaleNode {
    /// Create a scale node with the identity factor
    pub fn new() -> Self {
        Self {
            config: ScaleConfig::default(),
        }
    }

    /// Create with configuration
    pub fn with_config(config: ScaleConfig) -> Self {
        Self { config }
    }

    /// The configured factor
    pub fn factor(&self) -> i64 {
        self.config.factor
    }
}

#[async_trait]
impl FlowNode for ScaleNode {
    fn input_type(&self) -> ValueType {
        ValueType::Integer
    }

    fn output_type(&self) -> ValueType {
        ValueType::Integer
    }

    async fn invoke(&self, _ctx: &RunContext, input: Value) -> Result<Value> {
        let n = input
            .as_i64()
            .ok_or_else(|| ComposeError::InvalidInput("expected an integer".to_string()))?;
        Ok(json!(n * self.config.factor))
    }
}
