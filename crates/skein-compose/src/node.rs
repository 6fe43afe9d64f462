//! Node contract and adapters.
//!
//! A workflow node is anything implementing [`FlowNode`]: it declares the
//! shape of the value it consumes and the value it produces, and exposes a
//! single-shot [`FlowNode::invoke`] body. Streaming-capable nodes override
//! [`FlowNode::stream`] to emit their output incrementally; for everything
//! else the default turns the invoke result into a one-chunk stream.
//!
//! [`FnNode`] and [`FnStreamNode`] wrap plain async closures so small
//! transformations do not need a named type.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ComposeError, Result};
use crate::schema::ValueType;

/// Incremental output of a streaming node
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// How a node prefers to deliver its output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    /// One input value in, one output value out
    Invoke,
    /// One input value in, a sequence of output chunks out
    Stream,
}

/// Per-run state handed to every node invocation
///
/// The cancellation token is shared across the whole run; long-running node
/// bodies are expected to check it and bail out promptly once it fires.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Identifier of the enclosing run
    pub run_id: Uuid,
    /// Fires when the run is cancelled, fails, or times out
    pub cancellation: CancellationToken,
}

impl RunContext {
    /// Fresh context with a new run id and an unfired token
    ///
    /// The executor builds contexts internally; this is for driving a node
    /// directly, outside any compiled plan.
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of work in a workflow graph
///
/// Implementations declare their input and output shape up front so the
/// compiler can check every data edge before anything runs. The declared
/// types are fixed for the lifetime of the node; [`ValueType::Any`] opts a
/// side out of static checking.
///
/// Nodes that override [`FlowNode::stream`] should also report
/// [`NodeMode::Stream`] from [`FlowNode::mode`] and implement
/// [`FlowNode::invoke`] as the concatenation of their chunks (see
/// [`concat_chunks`]), so the same node behaves consistently under both
/// execution styles.
#[async_trait]
pub trait FlowNode: Send + Sync {
    /// Shape of the value this node consumes
    fn input_type(&self) -> ValueType;

    /// Shape of the value this node produces
    fn output_type(&self) -> ValueType;

    /// Preferred delivery style; drives end-of-graph stream forwarding
    fn mode(&self) -> NodeMode {
        NodeMode::Invoke
    }

    /// Run the node to completion and return its full output
    async fn invoke(&self, ctx: &RunContext, input: Value) -> Result<Value>;

    /// Run the node and emit its output incrementally
    ///
    /// The default wraps [`FlowNode::invoke`] in a single-chunk stream.
    async fn stream(&self, ctx: &RunContext, input: Value) -> Result<ChunkStream> {
        let output = self.invoke(ctx, input).await?;
        Ok(Box::pin(stream::once(async move { Ok(output) })))
    }
}

/// Concatenate stream chunks into one value
///
/// Text chunks append, list chunks extend, record chunks merge with later
/// keys overriding earlier ones. A single chunk of any type passes through
/// unchanged and an empty stream collapses to `null`. Anything else has no
/// defined concatenation and fails with [`ComposeError::ChunkConcat`].
pub fn concat_chunks(chunks: Vec<Value>) -> Result<Value> {
    let mut iter = chunks.into_iter();
    let mut acc = match iter.next() {
        Some(first) => first,
        None => return Ok(Value::Null),
    };
    for chunk in iter {
        acc = match (acc, chunk) {
            (Value::String(mut a), Value::String(b)) => {
                a.push_str(&b);
                Value::String(a)
            }
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Value::Array(a)
            }
            (Value::Object(mut a), Value::Object(b)) => {
                for (key, value) in b {
                    a.insert(key, value);
                }
                Value::Object(a)
            }
            (a, b) => {
                return Err(ComposeError::ChunkConcat(format!(
                    "no concatenation for {} followed by {}",
                    value_kind(&a),
                    value_kind(&b)
                )));
            }
        };
    }
    Ok(acc)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Node built from an async closure
///
/// The closure receives a clone of the run context alongside the assembled
/// input, so it can watch for cancellation like any hand-written node.
pub struct FnNode<F> {
    input_type: ValueType,
    output_type: ValueType,
    func: F,
}

impl<F, Fut> FnNode<F>
where
    F: Fn(RunContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    /// Wrap `func` as an invoke-mode node with the given declared types
    pub fn new(input_type: ValueType, output_type: ValueType, func: F) -> Self {
        Self {
            input_type,
            output_type,
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> FlowNode for FnNode<F>
where
    F: Fn(RunContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn input_type(&self) -> ValueType {
        self.input_type.clone()
    }

    fn output_type(&self) -> ValueType {
        self.output_type.clone()
    }

    async fn invoke(&self, ctx: &RunContext, input: Value) -> Result<Value> {
        (self.func)(ctx.clone(), input).await
    }
}

/// Streaming node built from an async closure returning chunks
///
/// Under [`FlowNode::stream`] the chunks are emitted one at a time; under
/// [`FlowNode::invoke`] they are concatenated with [`concat_chunks`].
pub struct FnStreamNode<F> {
    input_type: ValueType,
    output_type: ValueType,
    func: F,
}

impl<F, Fut> FnStreamNode<F>
where
    F: Fn(RunContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
{
    /// Wrap `func` as a stream-mode node with the given declared types
    pub fn new(input_type: ValueType, output_type: ValueType, func: F) -> Self {
        Self {
            input_type,
            output_type,
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> FlowNode for FnStreamNode<F>
where
    F: Fn(RunContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
{
    fn input_type(&self) -> ValueType {
        self.input_type.clone()
    }

    fn output_type(&self) -> ValueType {
        self.output_type.clone()
    }

    fn mode(&self) -> NodeMode {
        NodeMode::Stream
    }

    async fn invoke(&self, ctx: &RunContext, input: Value) -> Result<Value> {
        let chunks = (self.func)(ctx.clone(), input).await?;
        concat_chunks(chunks)
    }

    async fn stream(&self, ctx: &RunContext, input: Value) -> Result<ChunkStream> {
        let chunks = (self.func)(ctx.clone(), input).await?;
        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;

    fn doubler() -> impl FlowNode {
        FnNode::new(ValueType::Integer, ValueType::Integer, |_ctx, input| async move {
            Ok(json!(input.as_i64().unwrap_or(0) * 2))
        })
    }

    #[tokio::test]
    async fn test_fn_node_invoke() {
        let node = doubler();
        assert_eq!(node.mode(), NodeMode::Invoke);
        let output = node.invoke(&RunContext::new(), json!(5)).await.unwrap();
        assert_eq!(output, json!(10));
    }

    #[tokio::test]
    async fn test_default_stream_is_single_chunk() {
        let node = doubler();
        let chunks: Vec<Result<Value>> = node
            .stream(&RunContext::new(), json!(3))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), &json!(6));
    }

    #[tokio::test]
    async fn test_fn_stream_node_chunks_and_concat() {
        let node = FnStreamNode::new(ValueType::Text, ValueType::Text, |_ctx, _input| async {
            Ok(vec![json!("al"), json!("pha")])
        });
        assert_eq!(node.mode(), NodeMode::Stream);

        let chunks: Vec<Result<Value>> = node
            .stream(&RunContext::new(), json!(""))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);

        let whole = node.invoke(&RunContext::new(), json!("")).await.unwrap();
        assert_eq!(whole, json!("alpha"));
    }

    #[test]
    fn test_concat_text() {
        let out = concat_chunks(vec![json!("a"), json!("b"), json!("c")]).unwrap();
        assert_eq!(out, json!("abc"));
    }

    #[test]
    fn test_concat_lists_and_records() {
        let out = concat_chunks(vec![json!([1]), json!([2, 3])]).unwrap();
        assert_eq!(out, json!([1, 2, 3]));

        let out = concat_chunks(vec![json!({"a": 1, "b": 1}), json!({"b": 2})]).unwrap();
        assert_eq!(out, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_concat_single_and_empty() {
        assert_eq!(concat_chunks(vec![json!(7)]).unwrap(), json!(7));
        assert_eq!(concat_chunks(vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_concat_mixed_fails() {
        let err = concat_chunks(vec![json!(1), json!(2)]).unwrap_err();
        assert!(matches!(err, ComposeError::ChunkConcat(_)));

        let err = concat_chunks(vec![json!("a"), json!([1])]).unwrap_err();
        assert!(matches!(err, ComposeError::ChunkConcat(_)));
    }
}
