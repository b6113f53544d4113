// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! A2A Protocol - Direct member-to-member handoff.
//!
//! Each member explicitly names the next member in its output. The named
//! target is validated against the roster: an unrecognized target
//! resolves to the terminal route rather than raising an error or
//! retrying (hallucination containment). Member turns count against the
//! iteration budget, so mutual-handoff cycles terminate by budget.
//!
//! ```text
//! START ──▶ M1 ◀──────▶ M2 ◀──────▶ M3 ──▶ END
//! ```

use std::sync::Arc;

use concord_core::domain::graph::{GraphBuilder, GraphError, GraphModel, END_NODE, START_NODE};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};

use crate::tasks::{member_guard, FinalizeTask, HandoffMode, MemberNodeTask, MemberTaskOptions};

pub struct A2aProtocol;

impl CoordinationProtocol for A2aProtocol {
    fn name(&self) -> &'static str {
        "a2a"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask));

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
                        "You are {}: {}. Name the teammate who should act next, or reply {} when the task is complete.",
                        member.name(),
                        member.description(),
                        assembly.config.finish_marker
                    )),
                    handoff: HandoffMode::Strict,
                    count_iteration: true,
                    max_iterations: assembly.config.max_iterations,
                    finish_marker: assembly.config.finish_marker.clone(),
                    ..MemberTaskOptions::default()
                },
            );
            builder = builder.add_activity(member.name(), Arc::new(task));

            for peer in &names {
                if !peer.eq_ignore_ascii_case(member.name()) {
                    builder = builder.guarded_edge(member.name(), peer.clone(), member_guard(peer));
                }
            }
            builder = builder.edge(member.name(), END_NODE);
        }

        builder.build()
    }
}
