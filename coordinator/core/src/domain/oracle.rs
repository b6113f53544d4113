// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Oracle
//!
//! Provides the decision-oracle contract for the system.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-Corruption Layer for the routing oracle

// The oracle is a black box: one free-text completion, prompt in, text
// out. There is no structured-output guarantee; callers parse leniently.
// Implementations in infrastructure/llm/ directory.

use async_trait::async_trait;

/// Domain interface for the routing decision oracle.
///
/// Isolates coordination logic from vendor text-completion APIs.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// One free-text completion used to make a routing decision.
    async fn decide(
        &self,
        system_instruction: &str,
        history: &str,
    ) -> Result<String, OracleError>;

    /// Check if the oracle is healthy and accessible.
    async fn health_check(&self) -> Result<(), OracleError> {
        Ok(())
    }
}

/// Errors that can occur during oracle operations.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
