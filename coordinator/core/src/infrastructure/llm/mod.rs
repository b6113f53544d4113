// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Oracle Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between the domain's DecisionOracle
// interface and an external text-completion API.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use registry::{OracleProviderConfig, OracleRegistry};
