// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sequential Protocol - Fixed pipeline in registration order.
//!
//! ```text
//! START ──▶ M1 ──▶ M2 ──▶ … ──▶ Mn ──▶ END
//! ```
//!
//! Every member runs exactly once, in registration order, regardless of
//! prompt content. No decision oracle is consulted.

use std::sync::Arc;

use concord_core::domain::graph::{GraphBuilder, GraphError, GraphModel, END_NODE, START_NODE};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};

use crate::tasks::{FinalizeTask, HandoffMode, MemberNodeTask, MemberTaskOptions};

pub struct SequentialProtocol;

impl CoordinationProtocol for SequentialProtocol {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask));

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
                        "You are {}: {}. Build on the work so far.",
                        member.name(),
                        member.description()
                    )),
                    handoff: HandoffMode::None,
                    max_iterations: assembly.config.max_iterations,
                    finish_marker: assembly.config.finish_marker.clone(),
                    ..MemberTaskOptions::default()
                },
            );
            builder = builder.add_activity(member.name(), Arc::new(task));
        }

        builder = builder.edge(START_NODE, names[0].clone());
        for pair in names.windows(2) {
            builder = builder.edge(pair[0].clone(), pair[1].clone());
        }
        builder = builder.edge(names[names.len() - 1].clone(), END_NODE);

        builder.build()
    }
}
