// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod decision;
pub mod engine;
pub mod session;

// Re-export the primary services for convenience
pub use decision::{DecisionConfig, DecisionTask};
pub use engine::{EngineConfig, ExecutionEngine, RunOutcome};
pub use session::{CoordinationSession, SessionBuilder};
