//! Graph data model: nodes, edges, and the two reserved endpoints.
//!
//! A [`WorkflowGraph`] is the mutable form a builder accumulates into. It is
//! deliberately dumb storage; all structural checking happens in one pass at
//! compile time so the builder can stay append-only and edges may reference
//! nodes that are added later.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::mapping::FieldMapping;
use crate::node::FlowNode;
use crate::schema::ValueType;

/// Unique identifier of a node within one graph
pub type NodeId = String;

/// Reserved id of the entry endpoint; its "output" is the external input
pub const START: &str = "start";

/// Reserved id of the exit endpoint; its assembled "input" is the run output
pub const END: &str = "end";

/// Whether `id` names one of the two reserved endpoints
pub fn is_reserved(id: &str) -> bool {
    id == START || id == END
}

/// The two independent facets of an edge
///
/// A control edge orders execution; a data edge routes values. The default
/// edge carries both, mirroring the common "runs after and reads from" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyFlags {
    /// Target may not start until source has completed
    pub control: bool,
    /// Source's output contributes to target's input
    pub data: bool,
}

impl DependencyFlags {
    /// Control and data together (the default edge)
    pub fn full() -> Self {
        Self {
            control: true,
            data: true,
        }
    }

    /// Ordering only, no value routing
    pub fn control_only() -> Self {
        Self {
            control: true,
            data: false,
        }
    }

    /// Value routing only, no ordering
    ///
    /// The source must still finish before the target via some other control
    /// path; compilation enforces that.
    pub fn data_only() -> Self {
        Self {
            control: false,
            data: true,
        }
    }
}

impl Default for DependencyFlags {
    fn default() -> Self {
        Self::full()
    }
}

/// A directed edge between two endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Source node id, or [`START`]
    pub source: NodeId,
    /// Target node id, or [`END`]
    pub target: NodeId,
    /// Field routing rules; empty means whole-output-to-whole-input
    pub mappings: Vec<FieldMapping>,
    /// Control/data facets
    pub flags: DependencyFlags,
}

impl Edge {
    /// Edge carrying both control and data
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        mappings: Vec<FieldMapping>,
    ) -> Self {
        Self::with_flags(source, target, mappings, DependencyFlags::full())
    }

    /// Edge with explicit facets
    pub fn with_flags(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        mappings: Vec<FieldMapping>,
        flags: DependencyFlags,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            mappings,
            flags,
        }
    }
}

/// A node instance registered in a graph
pub struct GraphNode {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// The node body, shared with every plan compiled from this graph
    pub node: Arc<dyn FlowNode>,
}

/// A complete workflow graph in its mutable, pre-compilation form
pub struct WorkflowGraph {
    /// Declared shape of the external input (the output of [`START`])
    pub input_type: ValueType,
    /// Declared shape of the run output (the input of [`END`])
    pub output_type: ValueType,
    /// Nodes in registration order
    pub nodes: Vec<GraphNode>,
    /// Edges in registration order
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    /// Create an empty graph with the given external types
    pub fn new(input_type: ValueType, output_type: ValueType) -> Self {
        Self {
            input_type,
            output_type,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether `id` names a registered node or a reserved endpoint
    pub fn has_endpoint(&self, id: &str) -> bool {
        is_reserved(id) || self.find_node(id).is_some()
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Distinct control predecessors of a node, in edge registration order
    pub fn control_predecessors(&self, id: &str) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for edge in self.incoming_edges(id).filter(|e| e.flags.control) {
            if !out.contains(&edge.source) {
                out.push(edge.source.clone());
            }
        }
        out
    }

    /// Distinct control successors of a node, in edge registration order
    pub fn control_successors(&self, id: &str) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for edge in self.outgoing_edges(id).filter(|e| e.flags.control) {
            if !out.contains(&edge.target) {
                out.push(edge.target.clone());
            }
        }
        out
    }

    /// Declared input type of an endpoint ([`END`] consumes the run output)
    pub fn input_type_of(&self, id: &str) -> Option<ValueType> {
        if id == END {
            return Some(self.output_type.clone());
        }
        if id == START {
            return None;
        }
        self.find_node(id).map(|n| n.node.input_type())
    }

    /// Declared output type of an endpoint ([`START`] produces the external
    /// input)
    pub fn output_type_of(&self, id: &str) -> Option<ValueType> {
        if id == START {
            return Some(self.input_type.clone());
        }
        if id == END {
            return None;
        }
        self.find_node(id).map(|n| n.node.output_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FnNode, RunContext};
    use serde_json::Value;

    fn passthrough(ty: ValueType) -> Arc<dyn FlowNode> {
        let out = ty.clone();
        Arc::new(FnNode::new(ty, out, |_ctx: RunContext, input: Value| async move {
            Ok(input)
        }))
    }

    fn sample_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new(ValueType::Integer, ValueType::Integer);
        graph.nodes.push(GraphNode {
            id: "a".to_string(),
            node: passthrough(ValueType::Integer),
        });
        graph.nodes.push(GraphNode {
            id: "b".to_string(),
            node: passthrough(ValueType::Integer),
        });
        graph.edges.push(Edge::new(START, "a", vec![]));
        graph.edges.push(Edge::new("a", "b", vec![]));
        graph.edges.push(Edge::with_flags(
            START,
            "b",
            vec![],
            DependencyFlags::data_only(),
        ));
        graph.edges.push(Edge::new("b", END, vec![]));
        graph
    }

    #[test]
    fn test_reserved_ids() {
        assert!(is_reserved(START));
        assert!(is_reserved(END));
        assert!(!is_reserved("a"));
    }

    #[test]
    fn test_edge_queries() {
        let graph = sample_graph();
        assert_eq!(graph.incoming_edges("b").count(), 2);
        assert_eq!(graph.outgoing_edges("b").count(), 1);
        assert_eq!(graph.incoming_edges("a").count(), 1);
        assert!(graph.has_endpoint(START));
        assert!(graph.has_endpoint("a"));
        assert!(!graph.has_endpoint("missing"));
    }

    #[test]
    fn test_control_predecessors_skip_data_only() {
        let graph = sample_graph();
        // The data-only edge from start must not show up as a control
        // predecessor of b.
        assert_eq!(graph.control_predecessors("b"), vec!["a".to_string()]);
        assert_eq!(graph.control_predecessors("a"), vec![START.to_string()]);
    }

    #[test]
    fn test_endpoint_types() {
        let graph = sample_graph();
        assert_eq!(graph.output_type_of(START), Some(ValueType::Integer));
        assert_eq!(graph.input_type_of(END), Some(ValueType::Integer));
        assert_eq!(graph.input_type_of(START), None);
        assert_eq!(graph.output_type_of(END), None);
        assert_eq!(graph.input_type_of("a"), Some(ValueType::Integer));
        assert_eq!(graph.output_type_of("missing"), None);
    }

    #[test]
    fn test_flag_constructors() {
        assert_eq!(DependencyFlags::default(), DependencyFlags::full());
        assert!(DependencyFlags::control_only().control);
        assert!(!DependencyFlags::control_only().data);
        assert!(!DependencyFlags::data_only().control);
        assert!(DependencyFlags::data_only().data);
    }

    #[test]
    fn test_control_successors() {
        let graph = sample_graph();
        assert_eq!(graph.control_successors("a"), vec!["b".to_string()]);
        assert_eq!(graph.control_successors(START), vec!["a".to_string()]);
    }
}
