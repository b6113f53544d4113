// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Protocol - Peer handoff mesh with a decision fallback.
//!
//! Entry is the first registered member; the decision node is bypassed
//! entirely until a member fails to name a peer. On completion each
//! member either hands off to a named peer or falls through to a
//! lightweight decision step. The decision step applies a recency bias
//! against immediately re-selecting the most recent member, reducing
//! two-party ping-pong without forbidding it outright.
//!
//! ```text
//! START ──▶ M1 ◀──────▶ M2 ◀──────▶ M3      (named-peer handoffs)
//!            │            │           │
//!            └──────▶ ROUTER ◀───────┘      (no peer named)
//!                        │
//!                        ▼
//!                       END
//! ```

use std::sync::Arc;

use concord_core::application::decision::{DecisionConfig, DecisionTask};
use concord_core::domain::graph::{
    GraphBuilder, GraphError, GraphModel, END_NODE, ROUTER_NODE, START_NODE,
};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};

use crate::tasks::{
    member_guard, router_guard, FinalizeTask, HandoffMode, MemberNodeTask, MemberTaskOptions,
};

pub struct SwarmProtocol;

impl CoordinationProtocol for SwarmProtocol {
    fn name(&self) -> &'static str {
        "swarm"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }
        let oracle = assembly.oracle.clone().ok_or(GraphError::MissingOracle)?;

        let mut decision_config = DecisionConfig::from_coordination(
            &assembly.config,
            "No member named a successor. Pick the member best suited to continue.",
        );
        decision_config.recency_bias = true;

        let decision = DecisionTask::new(
            oracle,
            assembly.roster.clone(),
            assembly.interceptors.clone(),
            decision_config,
        );

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask))
            .add_activity(ROUTER_NODE, Arc::new(decision));

        let entry = assembly
            .roster
            .first()
            .expect("roster checked non-empty")
            .name()
            .to_string();
        builder = builder.edge(START_NODE, entry);

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
                        "You are {}: {}. Hand off by naming a teammate, or reply {} when the task is complete.",
                        member.name(),
                        member.description(),
                        assembly.config.finish_marker
                    )),
                    handoff: HandoffMode::PeerOrRouter,
                    max_iterations: assembly.config.max_iterations,
                    finish_marker: assembly.config.finish_marker.clone(),
                    // a vetoed member returns control to the decision step
                    veto_route: Some(concord_core::domain::trace::Route::Router),
                    ..MemberTaskOptions::default()
                },
            );
            builder = builder.add_activity(member.name(), Arc::new(task));

            for peer in &names {
                if !peer.eq_ignore_ascii_case(member.name()) {
                    builder = builder.guarded_edge(member.name(), peer.clone(), member_guard(peer));
                }
            }
            builder = builder
                .guarded_edge(member.name(), ROUTER_NODE, router_guard())
                .edge(member.name(), END_NODE);
        }

        for name in &names {
            builder = builder.guarded_edge(ROUTER_NODE, name.clone(), member_guard(name));
        }
        builder = builder.edge(ROUTER_NODE, END_NODE);

        builder.build()
    }
}
