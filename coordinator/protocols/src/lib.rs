// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `concord-protocols` — Coordination Protocol Strategies
//!
//! The seven pluggable coordination strategies of the Concord
//! coordinator, all sharing the `concord-core` execution substrate.
//!
//! ## Crate Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`kind`] | Closed `ProtocolKind` selector |
//! | [`tasks`] | Shared node tasks (member execution, bidding, matching, finalization) |
//! | [`sequential`] | Linear chain in registration order |
//! | [`hierarchical`] | Supervisor star with a central decision node |
//! | [`swarm`] | Peer handoff mesh with decision fallback |
//! | [`contract_net`] | Parallel bidding barrier, then a single award |
//! | [`market`] | Capability-tag matching, graceful no-match outcome |
//! | [`blackboard`] | Shared-board coordination behind a gating predicate |
//! | [`a2a`] | Direct member-to-member handoff with containment |
//!
//! Every strategy builds its graph once at configuration time and owns no
//! mutable state: all runtime data flows through the execution context
//! and the collaboration trace.

pub mod a2a;
pub mod blackboard;
pub mod contract_net;
pub mod hierarchical;
pub mod kind;
pub mod market;
pub mod sequential;
pub mod swarm;
pub mod tasks;

pub use a2a::A2aProtocol;
pub use blackboard::BlackboardProtocol;
pub use contract_net::ContractNetProtocol;
pub use hierarchical::HierarchicalProtocol;
pub use kind::ProtocolKind;
pub use market::MarketProtocol;
pub use sequential::SequentialProtocol;
pub use swarm::SwarmProtocol;
