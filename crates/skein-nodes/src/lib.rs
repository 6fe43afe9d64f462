//! Skein Nodes
//!
//! Reusable node implementations for the Skein workflow engine.
//! Each node implements [`skein_compose::FlowNode`] and can be wired into
//! any graph built with [`skein_compose::WorkflowBuilder`].
//!
//! # Categories
//!
//! - **Math**: integer arithmetic (sum, product, scale)
//! - **Text**: template rendering and streaming chunking

pub mod math;
pub mod text;

// Re-export all nodes for convenience
pub use math::*;
pub use text::*;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use skein_compose::{FieldDef, FieldMapping, ValueType, WorkflowBuilder, START};

    #[tokio::test]
    async fn test_calculator_workflow() {
        // (2 + 5) * 3: sum the list, then multiply by the factor field.
        let input_type = ValueType::record(vec![
            FieldDef::required("values", ValueType::list(ValueType::Integer)),
            FieldDef::required("factor", ValueType::Integer),
        ]);
        let mut builder = WorkflowBuilder::new(input_type, ValueType::Integer);
        builder
            .add_node("sum", SumNode::new())
            .unwrap()
            .add_input(START, vec![FieldMapping::from_field("values")])
            .unwrap();
        builder
            .add_node("product", ProductNode::new())
            .unwrap()
            .add_input("sum", vec![FieldMapping::to_field(ProductNode::FIELD_A)])
            .unwrap()
            .add_input(
                START,
                vec![FieldMapping::fields("factor", ProductNode::FIELD_B)],
            )
            .unwrap();
        builder.end().add_input("product", vec![]).unwrap();

        let runner = builder.compile().unwrap();
        let output = runner
            .invoke(json!({"values": [2, 5], "factor": 3}))
            .await
            .unwrap();
        assert_eq!(output, json!(21));
    }

    #[tokio::test]
    async fn test_sum_then_scale_workflow() {
        let mut builder = WorkflowBuilder::new(
            ValueType::list(ValueType::Integer),
            ValueType::Integer,
        );
        builder
            .add_node("sum", SumNode::new())
            .unwrap()
            .add_input(START, vec![])
            .unwrap();
        builder
            .add_node("scale", ScaleNode::with_config(ScaleConfig { factor: 10 }))
            .unwrap()
            .add_input("sum", vec![])
            .unwrap();
        builder.end().add_input("scale", vec![]).unwrap();

        let runner = builder.compile().unwrap();
        let output = runner.invoke(json!([1, 2, 3])).await.unwrap();
        assert_eq!(output, json!(60));
    }

    #[tokio::test]
    async fn test_template_to_chunker_streams() {
        let input_type =
            ValueType::record(vec![FieldDef::required("name", ValueType::Any)]);
        let mut builder = WorkflowBuilder::new(input_type, ValueType::Text);
        builder
            .add_node("greet", TemplateNode::new("Hello, {name}!"))
            .unwrap()
            .add_input(START, vec![])
            .unwrap();
        builder
            .add_node("chunks", ChunkerNode::with_config(ChunkerConfig { chunk_size: 5 }))
            .unwrap()
            .add_input("greet", vec![])
            .unwrap();
        builder.end().add_input("chunks", vec![]).unwrap();

        let runner = builder.compile().unwrap();
        assert_eq!(runner.plan().stream_feed(), Some("chunks"));

        let mut output = runner.stream(json!({"name": "Ada"}));
        let mut text = String::new();
        let mut frames = 0;
        while let Some(frame) = output.recv().await {
            let chunk: Value = frame.unwrap();
            text.push_str(chunk.as_str().unwrap());
            frames += 1;
        }
        assert_eq!(text, "Hello, Ada!");
        assert!(frames > 1, "Expected more than one streamed frame");
    }
}
