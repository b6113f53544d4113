// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Graph Model — Domain Model
//!
//! Nodes, guarded edges, and the builder for coordination graphs. A graph
//! is built once by a protocol at configuration time and traversed by the
//! execution engine against an [`ExecutionContext`].
//!
//! # Invariants
//!
//! - Node ids are unique.
//! - Every edge references existing nodes.
//! - START and END are present.
//! - Edges are kept in declaration order; for exclusive gateways the first
//!   satisfied guard wins and an unguarded edge acts as the default.
//!
//! Cycles are permitted: handoff protocols revisit nodes, bounded by the
//! iteration and step budgets rather than a static acyclicity check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::context::{ExecutionContext, SharedContext};

// ============================================================================
// Reserved Node Ids
// ============================================================================

pub const START_NODE: &str = "START";
pub const END_NODE: &str = "END";
pub const ROUTER_NODE: &str = "ROUTER";
/// Alias used by supervisor-style protocols for the central decision node.
pub const SUPERVISOR_NODE: &str = ROUTER_NODE;
pub const BIDDING_NODE: &str = "BIDDING";

// ============================================================================
// Value Objects
// ============================================================================

/// Unique name for a node within a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new NodeId with validation.
    pub fn new(id: impl Into<String>) -> Result<Self, GraphError> {
        let id = id.into();
        if id.is_empty() {
            return Err(GraphError::EmptyNodeId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind determines how the engine treats the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    End,
    Activity,
    ExclusiveGateway,
    ParallelFork,
    ParallelJoin,
}

// ============================================================================
// Node Tasks and Guards
// ============================================================================

/// Errors raised by node tasks. These abort the run and propagate to the
/// caller with `last_node_id` parked at the failing node.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("member '{member}' failed: {reason}")]
    Member { member: String, reason: String },

    #[error("interceptor '{interceptor}' failed: {reason}")]
    Interceptor { interceptor: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Work attached to an activity (or join) node.
///
/// Tasks receive the shared context explicitly; there is no ambient
/// lookup. A task must not hold the context lock across member or oracle
/// calls, and a task that can suspend the run must re-check its own
/// unblocking condition when it is re-entered after resume.
#[async_trait]
pub trait NodeTask: Send + Sync {
    async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError>;
}

/// Guard predicate over the execution context, evaluated under the context
/// lock during edge selection.
pub type GuardFn = Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync>;

// ============================================================================
// Nodes and Edges
// ============================================================================

/// A node of the coordination graph.
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    task: Option<Arc<dyn NodeTask>>,
}

impl Node {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn task(&self) -> Option<&Arc<dyn NodeTask>> {
        self.task.as_ref()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

/// A directed edge with an optional guard.
pub struct Edge {
    source: NodeId,
    target: NodeId,
    guard: Option<GuardFn>,
}

impl Edge {
    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn guard(&self) -> Option<&GuardFn> {
        self.guard.as_ref()
    }

    /// Whether this edge is the unguarded default.
    pub fn is_default(&self) -> bool {
        self.guard.is_none()
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

// ============================================================================
// Graph Model
// ============================================================================

/// Immutable coordination graph, built by a protocol at configuration time.
#[derive(Debug)]
pub struct GraphModel {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
}

impl GraphModel {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Outgoing edges of a node, in declaration order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source.as_str() == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node id cannot be empty")]
    EmptyNodeId,

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("edge references unknown node '{0}'")]
    UnknownNode(String),

    #[error("graph has no START node")]
    MissingStart,

    #[error("graph has no END node")]
    MissingEnd,

    #[error("parallel fork '{0}' has no outgoing branches")]
    EmptyFork(String),

    #[error("protocol requires at least one registered member")]
    NoMembers,

    #[error("protocol requires a decision oracle")]
    MissingOracle,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`GraphModel`]. Invariants are enforced at `build` time.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    error: Option<GraphError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_node(mut self, id: impl Into<String>, kind: NodeKind, task: Option<Arc<dyn NodeTask>>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match NodeId::new(id) {
            Ok(id) => self.nodes.push(Node { id, kind, task }),
            Err(e) => self.error = Some(e),
        }
        self
    }

    fn push_edge(mut self, source: impl Into<String>, target: impl Into<String>, guard: Option<GuardFn>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (NodeId::new(source), NodeId::new(target)) {
            (Ok(source), Ok(target)) => self.edges.push(Edge { source, target, guard }),
            (Err(e), _) | (_, Err(e)) => self.error = Some(e),
        }
        self
    }

    /// Add the reserved START node.
    pub fn add_start(self) -> Self {
        self.push_node(START_NODE, NodeKind::Start, None)
    }

    /// Add the reserved END node.
    pub fn add_end(self) -> Self {
        self.push_node(END_NODE, NodeKind::End, None)
    }

    /// Add the reserved END node with a finalizer task.
    pub fn add_end_with(self, task: Arc<dyn NodeTask>) -> Self {
        self.push_node(END_NODE, NodeKind::End, Some(task))
    }

    /// Add an activity node with its task.
    pub fn add_activity(self, id: impl Into<String>, task: Arc<dyn NodeTask>) -> Self {
        self.push_node(id, NodeKind::Activity, Some(task))
    }

    /// Add an exclusive gateway (routing only, no task).
    pub fn add_gateway(self, id: impl Into<String>) -> Self {
        self.push_node(id, NodeKind::ExclusiveGateway, None)
    }

    /// Add a parallel fork node. Every outgoing edge opens one branch.
    pub fn add_fork(self, id: impl Into<String>) -> Self {
        self.push_node(id, NodeKind::ParallelFork, None)
    }

    /// Add a parallel join node (barrier).
    pub fn add_join(self, id: impl Into<String>) -> Self {
        self.push_node(id, NodeKind::ParallelJoin, None)
    }

    /// Add a parallel join node whose task runs once after the barrier.
    pub fn add_join_with(self, id: impl Into<String>, task: Arc<dyn NodeTask>) -> Self {
        self.push_node(id, NodeKind::ParallelJoin, Some(task))
    }

    /// Add an unconditional edge (acts as the default on gateways).
    pub fn edge(self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.push_edge(source, target, None)
    }

    /// Add a guarded edge. Guards are evaluated in declaration order.
    pub fn guarded_edge(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
        guard: GuardFn,
    ) -> Self {
        self.push_edge(source, target, Some(guard))
    }

    /// Validate the accumulated graph and build the model.
    pub fn build(self) -> Result<GraphModel, GraphError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut nodes: HashMap<String, Node> = HashMap::new();
        for node in self.nodes {
            let key = node.id.as_str().to_string();
            if nodes.insert(key.clone(), node).is_some() {
                return Err(GraphError::DuplicateNode(key));
            }
        }

        if !nodes.contains_key(START_NODE) {
            return Err(GraphError::MissingStart);
        }
        if !nodes.contains_key(END_NODE) {
            return Err(GraphError::MissingEnd);
        }

        for edge in &self.edges {
            if !nodes.contains_key(edge.source.as_str()) {
                return Err(GraphError::UnknownNode(edge.source.as_str().to_string()));
            }
            if !nodes.contains_key(edge.target.as_str()) {
                return Err(GraphError::UnknownNode(edge.target.as_str().to_string()));
            }
        }

        for node in nodes.values() {
            if node.kind == NodeKind::ParallelFork
                && !self.edges.iter().any(|e| e.source == node.id)
            {
                return Err(GraphError::EmptyFork(node.id.as_str().to_string()));
            }
        }

        Ok(GraphModel {
            nodes,
            edges: self.edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTask;

    #[async_trait]
    impl NodeTask for NoopTask {
        async fn run(&self, _ctx: &SharedContext) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[test]
    fn test_node_id_validation() {
        assert!(NodeId::new("worker").is_ok());
        assert!(matches!(NodeId::new(""), Err(GraphError::EmptyNodeId)));
    }

    #[test]
    fn test_build_minimal_graph() {
        let graph = GraphBuilder::new()
            .add_start()
            .add_activity("work", Arc::new(NoopTask))
            .add_end()
            .edge(START_NODE, "work")
            .edge("work", END_NODE)
            .build()
            .expect("valid graph");

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains(START_NODE));
        assert_eq!(graph.node("work").unwrap().kind(), NodeKind::Activity);
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let result = GraphBuilder::new()
            .add_start()
            .add_end()
            .add_activity("work", Arc::new(NoopTask))
            .add_activity("work", Arc::new(NoopTask))
            .build();
        assert!(matches!(result, Err(GraphError::DuplicateNode(id)) if id == "work"));
    }

    #[test]
    fn test_edge_to_unknown_node_rejected() {
        let result = GraphBuilder::new()
            .add_start()
            .add_end()
            .edge(START_NODE, "ghost")
            .build();
        assert!(matches!(result, Err(GraphError::UnknownNode(id)) if id == "ghost"));
    }

    #[test]
    fn test_missing_start_or_end_rejected() {
        let no_start = GraphBuilder::new().add_end().build();
        assert!(matches!(no_start, Err(GraphError::MissingStart)));

        let no_end = GraphBuilder::new().add_start().build();
        assert!(matches!(no_end, Err(GraphError::MissingEnd)));
    }

    #[test]
    fn test_fork_without_branches_rejected() {
        let result = GraphBuilder::new()
            .add_start()
            .add_fork("fan_out")
            .add_end()
            .edge(START_NODE, "fan_out")
            .build();
        assert!(matches!(result, Err(GraphError::EmptyFork(id)) if id == "fan_out"));
    }

    #[test]
    fn test_outgoing_preserves_declaration_order() {
        let graph = GraphBuilder::new()
            .add_start()
            .add_gateway("route")
            .add_activity("a", Arc::new(NoopTask))
            .add_activity("b", Arc::new(NoopTask))
            .add_end()
            .edge(START_NODE, "route")
            .guarded_edge("route", "a", Arc::new(|_: &ExecutionContext| false))
            .guarded_edge("route", "b", Arc::new(|_: &ExecutionContext| true))
            .edge("route", END_NODE)
            .edge("a", END_NODE)
            .edge("b", END_NODE)
            .build()
            .expect("valid graph");

        let targets: Vec<&str> = graph.outgoing("route").map(|e| e.target().as_str()).collect();
        assert_eq!(targets, vec!["a", "b", "END"]);
    }
}
