// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Protocol Selection
//!
//! The closed set of coordination strategies. Selection is a tagged
//! variant resolved at configuration time: no runtime reflection, no
//! string-based lookup.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use concord_core::domain::protocol::CoordinationProtocol;

use crate::a2a::A2aProtocol;
use crate::blackboard::BlackboardProtocol;
use crate::contract_net::ContractNetProtocol;
use crate::hierarchical::HierarchicalProtocol;
use crate::market::MarketProtocol;
use crate::sequential::SequentialProtocol;
use crate::swarm::SwarmProtocol;

/// The seven coordination-protocol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Sequential,
    Hierarchical,
    Swarm,
    ContractNet,
    Market,
    Blackboard,
    A2a,
}

impl ProtocolKind {
    /// Instantiate the strategy with its default configuration. Variants
    /// with knobs (market threshold, blackboard predicate) can instead be
    /// constructed directly.
    pub fn instantiate(self) -> Arc<dyn CoordinationProtocol> {
        match self {
            Self::Sequential => Arc::new(SequentialProtocol),
            Self::Hierarchical => Arc::new(HierarchicalProtocol),
            Self::Swarm => Arc::new(SwarmProtocol),
            Self::ContractNet => Arc::new(ContractNetProtocol),
            Self::Market => Arc::new(MarketProtocol::default()),
            Self::Blackboard => Arc::new(BlackboardProtocol::default()),
            Self::A2a => Arc::new(A2aProtocol),
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sequential => "sequential",
            Self::Hierarchical => "hierarchical",
            Self::Swarm => "swarm",
            Self::ContractNet => "contract-net",
            Self::Market => "market",
            Self::Blackboard => "blackboard",
            Self::A2a => "a2a",
        };
        write!(f, "{}", name)
    }
}
