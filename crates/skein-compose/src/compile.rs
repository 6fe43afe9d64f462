//! Graph compilation: structural validation and freezing into a plan.
//!
//! Compilation is a pure function of the graph. It checks edge endpoints and
//! flags, rejects control cycles (reporting the offending path), verifies
//! control connectivity between the two reserved endpoints, resolves every
//! field mapping against the declared types, proves each node's input can be
//! fully assembled, enforces that every data source finishes before its
//! consumer starts, and finally groups nodes into execution layers.
//!
//! The result is a [`CompiledPlan`]: an immutable snapshot the executor can
//! run any number of times, concurrently, without ever re-validating.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::{ComposeError, Result};
use crate::graph::{is_reserved, NodeId, WorkflowGraph, END, START};
use crate::mapping::{self, FieldMapping, ResolvedAssignment};
use crate::node::{FlowNode, NodeMode};
use crate::schema::ValueType;

/// An immutable, validated execution plan
///
/// Holds shared references to the node bodies, the layer schedule, and the
/// resolved input assignments for every node (including [`END`], whose
/// assembled input is the run output). Plans are safe to share across
/// threads and reuse for any number of concurrent runs.
pub struct CompiledPlan {
    input_type: ValueType,
    output_type: ValueType,
    nodes: HashMap<NodeId, Arc<dyn FlowNode>>,
    layers: Vec<Vec<NodeId>>,
    assignments: HashMap<NodeId, Vec<ResolvedAssignment>>,
    data_sources: HashMap<NodeId, Vec<NodeId>>,
    stream_feed: Option<NodeId>,
}

impl CompiledPlan {
    /// Declared shape of the external input
    pub fn input_type(&self) -> &ValueType {
        &self.input_type
    }

    /// Declared shape of the run output
    pub fn output_type(&self) -> &ValueType {
        &self.output_type
    }

    /// Execution layers in order; nodes within a layer are independent
    pub fn layers(&self) -> &[Vec<NodeId>] {
        &self.layers
    }

    /// Number of nodes in the plan
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolved input assignments for a node or [`END`]
    pub fn assignments_for(&self, id: &str) -> &[ResolvedAssignment] {
        self.assignments.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct data sources feeding a node, in edge registration order
    pub fn data_sources(&self, id: &str) -> &[NodeId] {
        self.data_sources.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node whose chunks stream straight to [`END`], if the graph ends in one
    pub fn stream_feed(&self) -> Option<&str> {
        self.stream_feed.as_deref()
    }

    /// Shared handle to a node body
    pub fn node(&self, id: &str) -> Option<&Arc<dyn FlowNode>> {
        self.nodes.get(id)
    }
}

impl fmt::Debug for CompiledPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPlan")
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .field("layers", &self.layers)
            .field("stream_feed", &self.stream_feed)
            .finish()
    }
}

/// Validate `graph` and freeze it into a [`CompiledPlan`]
///
/// Checks run in a fixed order and the first failure wins: structure, then
/// control cycles, then connectivity, then mapping resolution, then input
/// coverage, then data readiness. Performs no I/O and runs no node bodies.
pub fn compile(graph: &WorkflowGraph) -> Result<CompiledPlan> {
    validate_structure(graph)?;
    detect_cycles(graph)?;
    validate_connectivity(graph)?;
    let assignments = resolve_assignments(graph)?;
    validate_coverage(graph, &assignments)?;
    let data_sources = collect_data_sources(graph);
    validate_data_readiness(graph, &data_sources)?;
    let layers = build_layers(graph);
    let stream_feed = detect_stream_feed(graph, &assignments, &layers);

    let nodes: HashMap<NodeId, Arc<dyn FlowNode>> = graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), Arc::clone(&n.node)))
        .collect();

    log::debug!(
        "compiled workflow: {} nodes in {} layers, stream feed {:?}",
        nodes.len(),
        layers.len(),
        stream_feed
    );

    Ok(CompiledPlan {
        input_type: graph.input_type.clone(),
        output_type: graph.output_type.clone(),
        nodes,
        layers,
        assignments,
        data_sources,
        stream_feed,
    })
}

// ---------------------------------------------------------------------------
// Validation passes
// ---------------------------------------------------------------------------

/// Check node ids, edge endpoints, and edge flags
fn validate_structure(graph: &WorkflowGraph) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if is_reserved(&node.id) {
            return Err(ComposeError::build(format!(
                "node id '{}' is reserved",
                node.id
            )));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(ComposeError::build(format!(
                "node id '{}' is already in use",
                node.id
            )));
        }
    }
    for edge in &graph.edges {
        if edge.source == END {
            return Err(ComposeError::build("edges cannot leave 'end'"));
        }
        if edge.target == START {
            return Err(ComposeError::build("edges cannot enter 'start'"));
        }
        if !graph.has_endpoint(&edge.source) {
            return Err(ComposeError::build(format!(
                "edge references unknown node '{}'",
                edge.source
            )));
        }
        if !graph.has_endpoint(&edge.target) {
            return Err(ComposeError::build(format!(
                "edge references unknown node '{}'",
                edge.target
            )));
        }
        if !edge.flags.control && !edge.flags.data {
            return Err(ComposeError::build(format!(
                "edge '{}' -> '{}' carries neither control nor data",
                edge.source, edge.target
            )));
        }
        if !edge.flags.data && !edge.mappings.is_empty() {
            return Err(ComposeError::build(format!(
                "control-only edge '{}' -> '{}' cannot carry field mappings",
                edge.source, edge.target
            )));
        }
    }
    Ok(())
}

/// Reject cycles in the control subgraph, reporting the cycle path
fn detect_cycles(graph: &WorkflowGraph) -> Result<()> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.flags.control) {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visiting: HashSet<String> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut path: Vec<String> = Vec::new();
    for node in &graph.nodes {
        if !visited.contains(&node.id) {
            cycle_dfs(&node.id, &adjacency, &mut visiting, &mut visited, &mut path)?;
        }
    }
    Ok(())
}

fn cycle_dfs(
    node: &str,
    adjacency: &HashMap<&str, Vec<&str>>,
    visiting: &mut HashSet<String>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Result<()> {
    visiting.insert(node.to_string());
    path.push(node.to_string());
    if let Some(successors) = adjacency.get(node) {
        for &next in successors {
            if visited.contains(next) {
                continue;
            }
            if visiting.contains(next) {
                let from = path.iter().position(|p| p == next).unwrap_or(0);
                let mut cycle: Vec<String> = path[from..].to_vec();
                cycle.push(next.to_string());
                return Err(ComposeError::Cycle { path: cycle });
            }
            cycle_dfs(next, adjacency, visiting, visited, path)?;
        }
    }
    path.pop();
    visiting.remove(node);
    visited.insert(node.to_string());
    Ok(())
}

/// Every node must sit on a control path from [`START`] to [`END`]
fn validate_connectivity(graph: &WorkflowGraph) -> Result<()> {
    let reachable = control_closure(graph, START, false);
    for node in &graph.nodes {
        if !reachable.contains(node.id.as_str()) {
            return Err(ComposeError::build(format!(
                "node '{}' is not reachable from 'start' via control edges",
                node.id
            )));
        }
    }
    if !reachable.contains(END) {
        return Err(ComposeError::build(
            "'end' is not reachable from 'start' via control edges",
        ));
    }
    let reaches_end = control_closure(graph, END, true);
    for node in &graph.nodes {
        if !reaches_end.contains(node.id.as_str()) {
            return Err(ComposeError::build(format!(
                "node '{}' has no control path to 'end'",
                node.id
            )));
        }
    }
    Ok(())
}

/// Endpoints reachable from `from` over control edges, excluding `from`
/// itself; `backward` walks edges in reverse (collecting control ancestors)
fn control_closure<'a>(graph: &'a WorkflowGraph, from: &str, backward: bool) -> HashSet<&'a str> {
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut frontier: VecDeque<String> = VecDeque::new();
    frontier.push_back(from.to_string());
    while let Some(current) = frontier.pop_front() {
        for edge in graph.edges.iter().filter(|e| e.flags.control) {
            let next = if backward {
                if edge.target == current {
                    edge.source.as_str()
                } else {
                    continue;
                }
            } else if edge.source == current {
                edge.target.as_str()
            } else {
                continue;
            };
            if seen.insert(next) {
                frontier.push_back(next.to_string());
            }
        }
    }
    seen
}

/// Resolve every data edge's mappings into per-target assignments
fn resolve_assignments(graph: &WorkflowGraph) -> Result<HashMap<NodeId, Vec<ResolvedAssignment>>> {
    let mut assignments: HashMap<NodeId, Vec<ResolvedAssignment>> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.flags.data) {
        let source_type = graph.output_type_of(&edge.source).ok_or_else(|| {
            ComposeError::build(format!("edge references unknown node '{}'", edge.source))
        })?;
        let target_type = graph.input_type_of(&edge.target).ok_or_else(|| {
            ComposeError::build(format!("edge references unknown node '{}'", edge.target))
        })?;
        let slot = assignments.entry(edge.target.clone()).or_default();
        if edge.mappings.is_empty() {
            slot.push(mapping::resolve(
                &edge.source,
                &edge.target,
                &source_type,
                &target_type,
                &FieldMapping::whole(),
            )?);
        } else {
            for field_mapping in &edge.mappings {
                slot.push(mapping::resolve(
                    &edge.source,
                    &edge.target,
                    &source_type,
                    &target_type,
                    field_mapping,
                )?);
            }
        }
    }
    Ok(assignments)
}

/// Prove each node's input is fully covered, with no conflicting writes
fn validate_coverage(
    graph: &WorkflowGraph,
    assignments: &HashMap<NodeId, Vec<ResolvedAssignment>>,
) -> Result<()> {
    let mut targets: Vec<(&str, ValueType)> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.node.input_type()))
        .collect();
    targets.push((END, graph.output_type.clone()));

    for (id, input_type) in targets {
        let list = assignments.get(id).map(Vec::as_slice).unwrap_or(&[]);
        if list.is_empty() {
            return Err(ComposeError::UnsatisfiedInput {
                node: id.to_string(),
                reason: "no data edges supply its input".to_string(),
            });
        }
        let wholes = list.iter().filter(|a| a.is_whole()).count();
        if wholes > 1 {
            return Err(ComposeError::build(format!(
                "conflicting assignments for '{id}': multiple whole-value writes"
            )));
        }
        if wholes == 1 {
            if list.len() > 1 {
                return Err(ComposeError::build(format!(
                    "conflicting assignments for '{id}': whole-value write mixed with field writes"
                )));
            }
            continue;
        }

        let mut written: Vec<&str> = Vec::new();
        for assignment in list {
            if let Some(field) = &assignment.target_field {
                if written.contains(&field.as_str()) {
                    return Err(ComposeError::build(format!(
                        "conflicting assignments for '{id}': field '{field}' is written twice"
                    )));
                }
                written.push(field);
            }
        }
        if let Some(schema) = input_type.as_record() {
            for field in schema.required_fields() {
                if !written.contains(&field.name.as_str()) {
                    return Err(ComposeError::UnsatisfiedInput {
                        node: id.to_string(),
                        reason: format!("field '{}' has no mapping", field.name),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Distinct data sources per target, in edge registration order
fn collect_data_sources(graph: &WorkflowGraph) -> HashMap<NodeId, Vec<NodeId>> {
    let mut sources: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.flags.data) {
        let list = sources.entry(edge.target.clone()).or_default();
        if !list.contains(&edge.source) {
            list.push(edge.source.clone());
        }
    }
    sources
}

/// Every data source must complete before its consumer starts
///
/// A data-only edge carries no ordering of its own, so the source has to be
/// a control ancestor of the target through some other path. Without this a
/// node could start before its input exists.
fn validate_data_readiness(
    graph: &WorkflowGraph,
    data_sources: &HashMap<NodeId, Vec<NodeId>>,
) -> Result<()> {
    let mut targets: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    targets.push(END);
    for id in targets {
        let sources = match data_sources.get(id) {
            Some(sources) => sources,
            None => continue,
        };
        let ancestors = control_closure(graph, id, true);
        for source in sources {
            if !ancestors.contains(source.as_str()) {
                return Err(ComposeError::UnsatisfiedInput {
                    node: id.to_string(),
                    reason: format!(
                        "data source '{source}' is not a control ancestor; add a dependency so it completes first"
                    ),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Group nodes into layers by control depth
///
/// A node's depth is one past its deepest real control predecessor; nodes
/// fed only by [`START`] sit at depth zero. Within a layer, nodes keep their
/// registration order, so the schedule is deterministic for a given graph.
fn build_layers(graph: &WorkflowGraph) -> Vec<Vec<NodeId>> {
    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut in_degree: HashMap<&str, usize> = ids.iter().map(|id| (*id, 0)).collect();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges.iter().filter(|e| e.flags.control) {
        if edge.source == START || edge.target == END {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
            *degree += 1;
        }
        successors
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for id in &ids {
        if in_degree.get(id).copied().unwrap_or(0) == 0 {
            depth.insert(id, 0);
            queue.push_back(id);
        }
    }
    while let Some(current) = queue.pop_front() {
        let current_depth = depth.get(current).copied().unwrap_or(0);
        if let Some(nexts) = successors.get(current) {
            for &next in nexts {
                let next_depth = depth.entry(next).or_insert(0);
                if *next_depth < current_depth + 1 {
                    *next_depth = current_depth + 1;
                }
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    let max_depth = ids
        .iter()
        .filter_map(|id| depth.get(id))
        .max()
        .copied()
        .unwrap_or(0);
    let mut layers: Vec<Vec<NodeId>> = vec![Vec::new(); max_depth + 1];
    for node in &graph.nodes {
        if let Some(d) = depth.get(node.id.as_str()) {
            layers[*d].push(node.id.clone());
        }
    }
    layers.retain(|layer| !layer.is_empty());
    layers
}

/// Pick the node whose chunks can stream straight to [`END`], if any
///
/// Requires that [`END`]'s input is exactly one whole-value assignment from
/// a stream-mode node, that the node closes out the last layer alone, and
/// that nothing else consumes its output. Anything looser forces the output
/// to be materialized first.
fn detect_stream_feed(
    graph: &WorkflowGraph,
    assignments: &HashMap<NodeId, Vec<ResolvedAssignment>>,
    layers: &[Vec<NodeId>],
) -> Option<NodeId> {
    let end_assignments = assignments.get(END)?;
    if end_assignments.len() != 1 {
        return None;
    }
    let assignment = &end_assignments[0];
    if assignment.source_field.is_some()
        || assignment.target_field.is_some()
        || assignment.source == START
    {
        return None;
    }
    let feeder = graph.find_node(&assignment.source)?;
    if feeder.node.mode() != NodeMode::Stream {
        return None;
    }
    let last = layers.last()?;
    if last.len() != 1 || last[0] != assignment.source {
        return None;
    }
    let feeds_only_end = graph
        .outgoing_edges(&assignment.source)
        .filter(|e| e.flags.data)
        .all(|e| e.target == END);
    if !feeds_only_end {
        return None;
    }
    Some(assignment.source.clone())
}
