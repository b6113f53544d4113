// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Contract-Net Protocol - Broadcast bidding, then a single award.
//!
//! Two mandatory phases. The bidding fork broadcasts the task to every
//! member in parallel and records each member's self-described fitness as
//! a bid (dashboard + trace) before the barrier releases. Only then may
//! the award decision select exactly one member; the award node refuses
//! to decide with zero recorded bids, so jumping straight to award is
//! rejected by construction.
//!
//! ```text
//!                 ┌─▶ BID:M1 ─┐
//! START ─▶ BIDDING├─▶ BID:M2 ─┤▶ AWARD ─▶ Mx ─▶ END
//!       (fork)    └─▶ BID:M3 ─┘ (join)
//! ```

use std::sync::Arc;

use concord_core::application::decision::{DecisionConfig, DecisionTask};
use concord_core::domain::graph::{
    GraphBuilder, GraphError, GraphModel, BIDDING_NODE, END_NODE, START_NODE,
};
use concord_core::domain::protocol::{CoordinationProtocol, ProtocolAssembly};

use crate::tasks::{member_guard, BidTask, FinalizeTask, HandoffMode, MemberNodeTask, MemberTaskOptions};

/// Join node carrying the award decision.
pub const AWARD_NODE: &str = "AWARD";

pub struct ContractNetProtocol;

impl CoordinationProtocol for ContractNetProtocol {
    fn name(&self) -> &'static str {
        "contract-net"
    }

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
        if assembly.roster.is_empty() {
            return Err(GraphError::NoMembers);
        }
        let oracle = assembly.oracle.clone().ok_or(GraphError::MissingOracle)?;

        let mut award_config = DecisionConfig::from_coordination(
            &assembly.config,
            "Award the task to exactly one member, judging only by the recorded bids.",
        );
        award_config.include_bids = true;
        award_config.require_bids = true;

        let award = DecisionTask::new(
            oracle,
            assembly.roster.clone(),
            assembly.interceptors.clone(),
            award_config,
        );

        let mut builder = GraphBuilder::new()
            .add_start()
            .add_end_with(Arc::new(FinalizeTask))
            .add_fork(BIDDING_NODE)
            .add_join_with(AWARD_NODE, Arc::new(award))
            .edge(START_NODE, BIDDING_NODE);

        for member in assembly.roster.iter() {
            let bid_node = format!("BID:{}", member.name());
            builder = builder
                .add_activity(
                    bid_node.clone(),
                    Arc::new(BidTask::new(member.clone(), assembly.interceptors.clone())),
                )
                .edge(BIDDING_NODE, bid_node.clone())
                .edge(bid_node, AWARD_NODE);

            let execute = MemberNodeTask::new(
                member.clone(),
                assembly.roster.clone(),
                assembly.interceptors.clone(),
                MemberTaskOptions {
                    instruction: Some(format!(
                        "You are {}: {}. The task was awarded to you; deliver the result.",
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
                .add_activity(member.name(), Arc::new(execute))
                .guarded_edge(AWARD_NODE, member.name(), member_guard(member.name()))
                .edge(member.name(), END_NODE);
        }

        // Degenerate award (terminal route) falls through to END.
        builder = builder.edge(AWARD_NODE, END_NODE);

        builder.build()
    }
}
