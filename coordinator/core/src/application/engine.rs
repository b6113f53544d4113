// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Execution Engine Application Service
//!
//! This module implements the traversal engine that drives a coordination
//! graph against an execution context.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Graph traversal, parallel fan-out/join, suspend/resume
//! - **Dependencies:** Domain (GraphModel, ExecutionContext)
//!
//! # Traversal Loop
//!
//! ```text
//! loop {
//!     node = graph.node(current)
//!
//!     // Execute the node's task (may mutate context and trace)
//!     execute(node)
//!
//!     // Record the last-node pointer, observe suspension / completion
//!     context.last_node_id = current
//!     if context.stopped { return Suspended }
//!     if node.kind == End { return Completed }
//!
//!     // Pick the outgoing edge: first satisfied guard in declaration
//!     // order, unguarded edge as default
//!     current = select_edge(current)
//! }
//! ```
//!
//! A parallel fork dispatches all outgoing branches on the worker pool;
//! the matching join is a rendezvous barrier and any branch failure fails
//! the whole run immediately (fail-fast). The engine's own hard stop is
//! the step budget; exhausting it is a defined terminal transition, not an
//! error.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::context::SharedContext;
use crate::domain::graph::{GraphModel, NodeKind, TaskError, START_NODE};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard stop on node executions per run.
    pub max_steps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_steps: 64 }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// An END node was reached; carries the trace's final answer.
    Completed(Option<String>),
    /// `stop()` was observed during a task: explicit suspension, not an
    /// error. The run can be resumed from `last_node_id`.
    Suspended,
    /// The step budget ran out; the caller reads the partial answer from
    /// the trace.
    BudgetExhausted,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("node '{0}' not found in graph")]
    NodeNotFound(String),

    #[error("no outgoing edge matched from node '{0}'")]
    NoMatchingEdge(String),

    #[error("task at node '{node}' failed: {source}")]
    Task {
        node: String,
        #[source]
        source: TaskError,
    },

    #[error("parallel branch failed at node '{node}': {reason}")]
    Branch { node: String, reason: String },

    #[error("parallel fork '{0}' never reached a join node")]
    ForkWithoutJoin(String),

    #[error("parallel branches of '{fork}' converge on different join nodes ('{first}' vs '{second}')")]
    DivergentJoin {
        fork: String,
        first: String,
        second: String,
    },

    #[error("nested parallel fork '{0}' is not supported inside a branch")]
    NestedFork(String),

    #[error("parallel branch task aborted: {0}")]
    BranchAborted(String),
}

/// Traverses a [`GraphModel`] against an execution context.
pub struct ExecutionEngine {
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run the graph to completion, suspension, or budget exhaustion.
    ///
    /// The entry node is `start_hint` if given and present in the graph,
    /// else START. When resuming a previously stopped context, the stop
    /// flag is cleared and the hinted node re-executes; a node that can
    /// suspend must itself re-check the condition that caused suspension.
    pub async fn run(
        &self,
        graph: Arc<GraphModel>,
        start_hint: Option<&str>,
        ctx: &SharedContext,
    ) -> Result<RunOutcome, EngineError> {
        let mut current: String = match start_hint {
            Some(hint) if graph.contains(hint) => hint.to_string(),
            _ => START_NODE.to_string(),
        };

        {
            let mut guard = ctx.lock().await;
            if guard.is_stopped() {
                debug!(node = %current, "clearing stop flag for resumption");
                guard.clear_stop();
            }
        }

        let mut steps = 0u32;
        loop {
            let node = graph
                .node(&current)
                .ok_or_else(|| EngineError::NodeNotFound(current.clone()))?;

            steps += 1;
            if steps > self.config.max_steps {
                warn!(node = %current, steps, "step budget exhausted, terminating run");
                ctx.lock().await.set_last_node(current.clone());
                return Ok(RunOutcome::BudgetExhausted);
            }

            debug!(node = %current, kind = ?node.kind(), "executing node");

            let fork_join = match node.kind() {
                NodeKind::ParallelFork => Some(self.run_fork(&graph, &current, ctx).await?),
                _ => {
                    if let Some(task) = node.task() {
                        if let Err(err) = task.run(ctx).await {
                            ctx.lock().await.set_last_node(current.clone());
                            return Err(EngineError::Task {
                                node: current.clone(),
                                source: err,
                            });
                        }
                    }
                    None
                }
            };

            {
                let mut guard = ctx.lock().await;
                guard.set_last_node(current.clone());
                if guard.is_stopped() {
                    info!(node = %current, "run suspended");
                    return Ok(RunOutcome::Suspended);
                }
                if node.kind() == NodeKind::End {
                    return Ok(RunOutcome::Completed(guard.trace().final_answer.clone()));
                }
            }

            current = match fork_join {
                Some(join) => join,
                None => select_next(&graph, &current, ctx).await?,
            };
        }
    }

    /// Dispatch every outgoing branch of a fork on the worker pool and
    /// block at the join barrier. Returns the join node id; its task runs
    /// once, in the main loop, after all branches have reported.
    async fn run_fork(
        &self,
        graph: &Arc<GraphModel>,
        fork_id: &str,
        ctx: &SharedContext,
    ) -> Result<String, EngineError> {
        let branch_starts: Vec<String> = graph
            .outgoing(fork_id)
            .map(|e| e.target().as_str().to_string())
            .collect();
        if branch_starts.is_empty() {
            return Err(EngineError::ForkWithoutJoin(fork_id.to_string()));
        }

        debug!(fork = %fork_id, branches = branch_starts.len(), "dispatching parallel branches");

        let mut set: JoinSet<Result<String, EngineError>> = JoinSet::new();
        for start in branch_starts {
            let graph = graph.clone();
            let ctx = ctx.clone();
            let budget = self.config.max_steps;
            set.spawn(async move { run_branch(graph, start, ctx, budget).await });
        }

        let mut join_id: Option<String> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(branch_join)) => match &join_id {
                    Some(existing) if *existing != branch_join => {
                        set.abort_all();
                        let err = EngineError::DivergentJoin {
                            fork: fork_id.to_string(),
                            first: existing.clone(),
                            second: branch_join,
                        };
                        ctx.lock().await.set_last_node(fork_id);
                        return Err(err);
                    }
                    _ => join_id = Some(branch_join),
                },
                Ok(Err(err)) => {
                    // Fail-fast: abort the remaining branches, report the
                    // failing node for diagnosis.
                    set.abort_all();
                    let mut guard = ctx.lock().await;
                    match &err {
                        EngineError::Task { node, .. } => guard.set_last_node(node.clone()),
                        _ => guard.set_last_node(fork_id),
                    }
                    return Err(err);
                }
                Err(join_err) => {
                    set.abort_all();
                    ctx.lock().await.set_last_node(fork_id);
                    return Err(EngineError::BranchAborted(join_err.to_string()));
                }
            }
        }

        join_id.ok_or_else(|| EngineError::ForkWithoutJoin(fork_id.to_string()))
    }
}

/// Run one forked branch node-by-node until it reaches a ParallelJoin
/// node, returning that node's id.
async fn run_branch(
    graph: Arc<GraphModel>,
    start: String,
    ctx: SharedContext,
    budget: u32,
) -> Result<String, EngineError> {
    let mut current = start;
    let mut steps = 0u32;
    loop {
        let node = graph
            .node(&current)
            .ok_or_else(|| EngineError::NodeNotFound(current.clone()))?;

        match node.kind() {
            NodeKind::ParallelJoin => return Ok(current),
            NodeKind::ParallelFork => return Err(EngineError::NestedFork(current.clone())),
            _ => {}
        }

        steps += 1;
        if steps > budget {
            return Err(EngineError::Branch {
                node: current.clone(),
                reason: "step budget exhausted inside parallel branch".to_string(),
            });
        }

        if let Some(task) = node.task() {
            task.run(&ctx).await.map_err(|err| EngineError::Task {
                node: current.clone(),
                source: err,
            })?;
        }

        current = select_next(&graph, &current, &ctx).await?;
    }
}

/// Pick the outgoing edge of `current`: first guard (declaration order)
/// that evaluates true; an unguarded edge acts as the default.
async fn select_next(
    graph: &GraphModel,
    current: &str,
    ctx: &SharedContext,
) -> Result<String, EngineError> {
    let guard = ctx.lock().await;
    let mut fallback: Option<String> = None;
    for edge in graph.outgoing(current) {
        match edge.guard() {
            Some(predicate) => {
                if predicate(&*guard) {
                    return Ok(edge.target().as_str().to_string());
                }
            }
            None => {
                if fallback.is_none() {
                    fallback = Some(edge.target().as_str().to_string());
                }
            }
        }
    }
    fallback.ok_or_else(|| EngineError::NoMatchingEdge(current.to_string()))
}
