// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Market-Based Protocol - Capability matching without an oracle.
//!
//! Single-shot matching of the task text against each member's declared
//! capability tags first, free-text description second (explicit tags
//! outrank description overlap). The best-matching member executes; when
//! no member clears the minimal threshold the run terminates gracefully
//! with a "no suitable member" outcome rather than forcing an arbitrary
//! pick.
//!
//! ```text
//! START ──▶ MATCH ──▶ Mx ──▶ END
//!             └───────────▶ END   (below threshold)
//! ```

use std::sync::Arc;

use concord_core::domain::graph::{GraphBuilder, GraphError, GraphModel, END_NODE, START_NODE};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};

use crate::tasks::{
    member_guard, FinalizeTask, HandoffMode, MarketMatchTask, MemberNodeTask, MemberTaskOptions,
};

/// Matching node id.
pub const MATCH_NODE: &str = "MATCH";

pub struct MarketProtocol {
    threshold: u32,
}

impl MarketProtocol {
    /// `threshold` is the minimal match score a member must reach; one
    /// capability-tag hit scores well above one description-word hit.
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }
}

impl Default for MarketProtocol {
    fn default() -> Self {
        Self::new(1)
    }
}

impl CoordinationProtocol for MarketProtocol {
    fn name(&self) -> &'static str {
        "market"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask))
            .add_activity(
                MATCH_NODE,
                Arc::new(MarketMatchTask::new(assembly.roster.clone(), self.threshold)),
            )
            .edge(START_NODE, MATCH_NODE);

        for member in assembly.roster.iter() {
            let task = MemberNodeTask::new(
                member.clone(),
                assembly.roster.clone(),
                assembly.interceptors.clone(),
                MemberTaskOptions {
                    instruction: Some(format!(
                        "You are {}: {}. You won this task on capability match; deliver the result.",
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
                .guarded_edge(MATCH_NODE, member.name(), member_guard(member.name()))
                .edge(member.name(), END_NODE);
        }

        builder = builder.edge(MATCH_NODE, END_NODE);

        builder.build()
    }
}
