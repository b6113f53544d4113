// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hierarchical Protocol - Supervisor star topology.
//!
//! ```text
//!            ┌────────────┐
//!   START ──▶│   ROUTER   │──▶ END (no member matched / TERMINATE)
//!            └─┬───┬───┬──┘
//!              ▼   ▼   ▼
//!             M1  M2  M3   (every member returns to ROUTER)
//! ```
//!
//! A central decision node consults the oracle before every member turn;
//! member edges back to the router make the loop, bounded by the
//! iteration budget.

use std::sync::Arc;

use concord_core::application::decision::{DecisionConfig, DecisionTask};
use concord_core::domain::graph::{
    GraphBuilder, GraphError, GraphModel, END_NODE, ROUTER_NODE, START_NODE,
};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};

use crate::tasks::{member_guard, FinalizeTask, HandoffMode, MemberNodeTask, MemberTaskOptions};

pub struct HierarchicalProtocol;

impl CoordinationProtocol for HierarchicalProtocol {
    fn name(&self) -> &'static str {
        "hierarchical"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }
        let oracle = assembly.oracle.clone().ok_or(GraphError::MissingOracle)?;

        let decision = DecisionTask::new(
            oracle,
            assembly.roster.clone(),
            assembly.interceptors.clone(),
            DecisionConfig::from_coordination(
                &assembly.config,
                "Route between members until the task is complete; never pick a member with nothing left to add.",
            ),
        );

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask))
            .add_activity(ROUTER_NODE, Arc::new(decision))
            .edge(START_NODE, ROUTER_NODE);

        for member in assembly.roster.iter() {
            let task = MemberNodeTask::new(
                member.clone(),
                assembly.roster.clone(),
                assembly.interceptors.clone(),
                MemberTaskOptions {
                    instruction: Some(format!(
                        "You are {}: {}.",
                        member.name(),
                        member.description()
                    )),
                    handoff: HandoffMode::None,
                    max_iterations: assembly.config.max_iterations,
                    finish_marker: assembly.config.finish_marker.clone(),
                    ..MemberTaskOptions::default()
                },
            );
            builder = builder
                .add_activity(member.name(), Arc::new(task))
                .guarded_edge(ROUTER_NODE, member.name(), member_guard(member.name()))
                .edge(member.name(), ROUTER_NODE);
        }

        // Terminal route (or anything unmatched) falls through to END.
        builder = builder.edge(ROUTER_NODE, END_NODE);

        builder.build()
    }
}
