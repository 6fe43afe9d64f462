//! Skein Compose - typed workflow graph composition and execution
//!
//! This crate lets you wire async nodes into a workflow graph, compile the
//! graph into an immutable plan, and run that plan with layered parallelism.
//! It supports:
//!
//! - Typed node interfaces checked edge by edge at compile time
//! - Field-level data wiring between record-shaped values
//! - Control-only and data-only dependencies on top of ordinary edges
//! - Deterministic layering with concurrent execution inside each layer
//! - Single-shot invocation and incremental streaming of the output
//! - Cancellation, deadlines, and progress events per run
//!
//! # Architecture
//!
//! Graphs are built with [`WorkflowBuilder`] against the reserved `start`
//! and `end` endpoints, then frozen by [`compile`] into a [`CompiledPlan`]:
//! validation, field-mapping resolution, and layer assignment all happen
//! there, so a plan that compiles cannot fail structurally at run time. A
//! [`Runner`] executes the plan as often as needed, from any number of
//! tasks at once.
//!
//! # Example
//!
//! ```ignore
//! use skein_compose::{FnNode, ValueType, WorkflowBuilder, START};
//! use serde_json::json;
//!
//! let mut builder = WorkflowBuilder::new(ValueType::Integer, ValueType::Integer);
//! let double = FnNode::new(ValueType::Integer, ValueType::Integer, |_ctx, n| async move {
//!     Ok(json!(n.as_i64().unwrap_or(0) * 2))
//! });
//! builder.add_node("double", double)?.add_input(START, vec![])?;
//! builder.end().add_input("double", vec![])?;
//!
//! let runner = builder.compile()?;
//! assert_eq!(runner.invoke(json!(21)).await?, json!(42));
//! ```

pub mod builder;
pub mod compile;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod mapping;
pub mod node;
pub mod schema;
pub mod stream;

// Re-export key types
pub use builder::{EdgeOptions, NodeHandle, WorkflowBuilder};
pub use compile::{compile, CompiledPlan};
pub use error::{ComposeError, Result};
pub use events::{EventError, EventSink, NullEventSink, RunEvent, VecEventSink};
pub use executor::{RunOptions, Runner};
pub use graph::{
    is_reserved, DependencyFlags, Edge, GraphNode, NodeId, WorkflowGraph, END, START,
};
pub use mapping::{FieldMapping, ResolvedAssignment};
pub use node::{
    concat_chunks, ChunkStream, FlowNode, FnNode, FnStreamNode, NodeMode, RunContext,
};
pub use schema::{FieldDef, RecordSchema, ValueType};
pub use stream::OutputStream;
