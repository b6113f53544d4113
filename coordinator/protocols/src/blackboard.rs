// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Blackboard Protocol - Shared-state coordination without routing.
//!
//! Members coordinate through the dashboard's shared key/value region
//! instead of central routing: any member may read or write any key
//! (last-write-wins, no merging) and self-selects by inspecting board
//! state through the context passed to `ask`. A gating predicate blocks
//! the terminal transition until the board satisfies it; the loop is
//! bounded by the iteration and step budgets when it never does.
//!
//! ```text
//! START ──▶ M1 ──▶ M2 ──▶ … ──▶ Mn ──▶ GATE ──▶ END  (predicate holds)
//!            ▲───────────────────────────┘           (otherwise loop)
//! ```

use std::sync::Arc;

use concord_core::domain::context::ExecutionContext;
use concord_core::domain::graph::{GraphBuilder, GraphError, GraphModel, END_NODE, START_NODE};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};
use concord_core::domain::trace::Dashboard;

use crate::tasks::{FinalizeTask, HandoffMode, MemberNodeTask, MemberTaskOptions};

/// Gate node id.
pub const GATE_NODE: &str = "GATE";

/// Predicate over the shared board deciding when the run may terminate.
pub type BoardPredicate = Arc<dyn Fn(&Dashboard) -> bool + Send + Sync>;

pub struct BlackboardProtocol {
    done: BoardPredicate,
}

impl BlackboardProtocol {
    pub fn new(done: BoardPredicate) -> Self {
        Self { done }
    }

    /// Terminate once the board carries `key`.
    pub fn until_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(Arc::new(move |board: &Dashboard| board.contains_key(&key)))
    }
}

impl Default for BlackboardProtocol {
    fn default() -> Self {
        Self::until_key("done")
    }
}

impl CoordinationProtocol for BlackboardProtocol {
    fn name(&self) -> &'static str {
        "blackboard"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask))
            .add_gateway(GATE_NODE);

        let names: Vec<String> = assembly
            .roster
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();

        for member in assembly.roster.iter() {
            let task = MemberNodeTask::new(
                member.clone(),
                assembly.roster.clone(),
                assembly.interceptors.clone(),
                MemberTaskOptions {
                    instruction: Some(format!(
                        "You are {}: {}. You share a blackboard with your teammates; inspect it and contribute only where you can.",
                        member.name(),
                        member.description()
                    )),
                    handoff: HandoffMode::None,
                    count_iteration: true,
                    max_iterations: assembly.config.max_iterations,
                    finish_marker: assembly.config.finish_marker.clone(),
                    include_history: false,
                    ..MemberTaskOptions::default()
                },
            );
            builder = builder.add_activity(member.name(), Arc::new(task));
        }

        builder = builder.edge(START_NODE, names[0].clone());
        for pair in names.windows(2) {
            builder = builder.edge(pair[0].clone(), pair[1].clone());
        }
        builder = builder.edge(names[names.len() - 1].clone(), GATE_NODE);

        // Gate: terminal only once the board predicate holds (or the
        // iteration budget expired); otherwise re-enter the loop.
        let done = self.done.clone();
        builder = builder
            .guarded_edge(
                GATE_NODE,
                END_NODE,
                Arc::new(move |ctx: &ExecutionContext| {
                    done(&ctx.trace().dashboard) || ctx.trace().route.is_terminal()
                }),
            )
            .edge(GATE_NODE, names[0].clone());

        builder.build()
    }
}
