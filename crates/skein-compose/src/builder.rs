//! Fluent builder for workflow graphs
//!
//! The builder is append-only: nodes and edges accumulate and nothing is
//! cross-checked until [`WorkflowBuilder::compile`], so edges may name nodes
//! that are registered later. The only immediate failures are the ones that
//! can never become valid: reusing or reserving a node id, wiring an edge
//! into [`START`], or wiring one out of [`END`].

use std::sync::Arc;

use crate::compile;
use crate::error::{ComposeError, Result};
use crate::executor::Runner;
use crate::graph::{is_reserved, DependencyFlags, Edge, GraphNode, NodeId, WorkflowGraph, END, START};
use crate::mapping::FieldMapping;
use crate::node::FlowNode;
use crate::schema::ValueType;

/// Per-edge options
///
/// The default edge carries both control and data. Marking an edge
/// [`EdgeOptions::no_direct_dependency`] keeps the data routing but drops the
/// ordering constraint, for fan-ins where another path already sequences the
/// two nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeOptions {
    no_direct_dependency: bool,
}

impl EdgeOptions {
    /// Default options: a full control-and-data edge
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the ordering constraint, keeping only the data routing
    pub fn no_direct_dependency(mut self) -> Self {
        self.no_direct_dependency = true;
        self
    }

    fn flags(self) -> DependencyFlags {
        if self.no_direct_dependency {
            DependencyFlags::data_only()
        } else {
            DependencyFlags::full()
        }
    }
}

/// Fluent builder for constructing workflow graphs
///
/// # Example
///
/// ```ignore
/// let mut wf = WorkflowBuilder::new(ValueType::Integer, ValueType::Integer);
/// wf.add_node("double", double_node)?.add_input(START, vec![])?;
/// wf.end().add_input("double", vec![])?;
/// let runner = wf.compile()?;
/// ```
pub struct WorkflowBuilder {
    graph: WorkflowGraph,
}

impl WorkflowBuilder {
    /// Create a builder for a graph with the given external types
    pub fn new(input_type: ValueType, output_type: ValueType) -> Self {
        Self {
            graph: WorkflowGraph::new(input_type, output_type),
        }
    }

    /// Register a node under a unique id
    ///
    /// Fails if the id is already taken or names a reserved endpoint. The
    /// returned handle wires the node's inputs in place.
    pub fn add_node(
        &mut self,
        id: impl Into<NodeId>,
        node: impl FlowNode + 'static,
    ) -> Result<NodeHandle<'_>> {
        let id = id.into();
        if is_reserved(&id) {
            return Err(ComposeError::build(format!("node id '{id}' is reserved")));
        }
        if self.graph.find_node(&id).is_some() {
            return Err(ComposeError::build(format!(
                "node id '{id}' is already in use"
            )));
        }
        self.graph.nodes.push(GraphNode {
            id: id.clone(),
            node: Arc::new(node),
        });
        Ok(NodeHandle { builder: self, id })
    }

    /// Handle for wiring the inputs of [`END`]
    pub fn end(&mut self) -> NodeHandle<'_> {
        NodeHandle {
            builder: self,
            id: END.to_string(),
        }
    }

    /// Add a control-and-data edge from `source` to `target`
    ///
    /// An empty mapping list routes the whole source output to the whole
    /// target input. Repeated edges between the same pair accumulate their
    /// mappings.
    pub fn add_edge(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        mappings: Vec<FieldMapping>,
    ) -> Result<()> {
        self.push_edge(source.into(), target.into(), mappings, DependencyFlags::full())
    }

    /// Add an edge with explicit options
    pub fn add_edge_with_options(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        mappings: Vec<FieldMapping>,
        options: EdgeOptions,
    ) -> Result<()> {
        self.push_edge(source.into(), target.into(), mappings, options.flags())
    }

    /// Add a control-only edge: `target` runs after `source`, no data flows
    pub fn add_dependency(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Result<()> {
        self.push_edge(
            source.into(),
            target.into(),
            Vec::new(),
            DependencyFlags::control_only(),
        )
    }

    /// The graph accumulated so far
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Validate the whole graph and freeze it into an executable plan
    ///
    /// Compilation is pure: it performs no I/O and runs no node bodies. The
    /// builder is left untouched, so the same graph can be compiled again.
    pub fn compile(&self) -> Result<Runner> {
        let plan = compile::compile(&self.graph)?;
        Ok(Runner::new(plan))
    }

    fn push_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        mappings: Vec<FieldMapping>,
        flags: DependencyFlags,
    ) -> Result<()> {
        if source == END {
            return Err(ComposeError::build("edges cannot leave 'end'"));
        }
        if target == START {
            return Err(ComposeError::build("edges cannot enter 'start'"));
        }
        self.graph
            .edges
            .push(Edge::with_flags(source, target, mappings, flags));
        Ok(())
    }
}

/// Wiring handle for one node (or [`END`])
///
/// Returned by [`WorkflowBuilder::add_node`] and [`WorkflowBuilder::end`];
/// each call adds an incoming edge and hands the handle back for chaining.
pub struct NodeHandle<'a> {
    builder: &'a mut WorkflowBuilder,
    id: NodeId,
}

impl std::fmt::Debug for NodeHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl NodeHandle<'_> {
    /// Id of the node this handle wires
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a control-and-data edge from `source` into this node
    pub fn add_input(
        self,
        source: impl Into<NodeId>,
        mappings: Vec<FieldMapping>,
    ) -> Result<Self> {
        self.builder
            .push_edge(source.into(), self.id.clone(), mappings, DependencyFlags::full())?;
        Ok(self)
    }

    /// Add an edge from `source` into this node with explicit options
    pub fn add_input_with_options(
        self,
        source: impl Into<NodeId>,
        mappings: Vec<FieldMapping>,
        options: EdgeOptions,
    ) -> Result<Self> {
        self.builder
            .push_edge(source.into(), self.id.clone(), mappings, options.flags())?;
        Ok(self)
    }

    /// Add a control-only edge from `source` into this node
    pub fn add_dependency(self, source: impl Into<NodeId>) -> Result<Self> {
        self.builder.push_edge(
            source.into(),
            self.id.clone(),
            Vec::new(),
            DependencyFlags::control_only(),
        )?;
        Ok(self)
    }
}
