// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordination Protocol Contract — Domain Model
//!
//! A protocol is a stateless strategy bound to one configuration. It builds
//! the coordination graph at configuration time and owns no mutable data of
//! its own: everything it needs at runtime flows through the
//! [`ExecutionContext`](crate::domain::context::ExecutionContext) and the
//! trace.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::context::ExecutionContext;
use crate::domain::graph::{GraphError, GraphModel};
use crate::domain::interceptor::InterceptorChain;
use crate::domain::member::MemberRoster;
use crate::domain::oracle::DecisionOracle;

/// Retry policy applied around the decision-oracle call only. Member
/// failures are never retried by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 200,
        }
    }
}

/// Immutable session configuration. Per-run adjustments go through
/// [`RunOverrides`]; there are no shared mutable defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Routing/iteration budget consumed by decision invocations and by
    /// member turns in decentralized protocols.
    pub max_iterations: u32,

    /// Engine-level hard stop on node executions per run.
    pub max_steps: u32,

    /// Sentinel the oracle (or a member) emits to signal completion.
    pub finish_marker: String,

    /// Retry policy for the decision-oracle call.
    pub oracle_retry: RetryPolicy,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_steps: 64,
            finish_marker: "TERMINATE".to_string(),
            oracle_retry: RetryPolicy::default(),
        }
    }
}

impl CoordinationConfig {
    /// Overlay per-run overrides onto the immutable base configuration.
    pub fn with_overrides(&self, overrides: &RunOverrides) -> Self {
        Self {
            max_iterations: overrides.max_iterations.unwrap_or(self.max_iterations),
            max_steps: overrides.max_steps.unwrap_or(self.max_steps),
            finish_marker: overrides
                .finish_marker
                .clone()
                .unwrap_or_else(|| self.finish_marker.clone()),
            oracle_retry: self.oracle_retry.clone(),
        }
    }
}

/// Explicit per-run override overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOverrides {
    pub max_iterations: Option<u32>,
    pub max_steps: Option<u32>,
    pub finish_marker: Option<String>,
}

impl RunOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_iterations.is_none() && self.max_steps.is_none() && self.finish_marker.is_none()
    }
}

/// Everything a protocol needs to assemble its graph.
#[derive(Clone)]
pub struct ProtocolAssembly {
    pub roster: Arc<MemberRoster>,
    pub oracle: Option<Arc<dyn DecisionOracle>>,
    pub interceptors: Arc<InterceptorChain>,
    pub config: CoordinationConfig,
}

/// Strategy selected at configuration time. Implementations supply the
/// graph topology (and, through the node tasks they assemble, instruction
/// injection, prompt rewriting, and output post-processing) plus an
/// end-of-run cleanup hook.
pub trait CoordinationProtocol: Send + Sync {
    fn name(&self) -> &'static str;

    fn build_graph(&self, assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError>;

    /// End-of-run cleanup. Fires after the run completes or exhausts its
    /// budget; not on suspension or abort.
    fn on_run_end(&self, _ctx: &mut ExecutionContext) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_overlay_base_config() {
        let base = CoordinationConfig::default();
        let overridden = base.with_overrides(&RunOverrides {
            max_iterations: Some(3),
            max_steps: None,
            finish_marker: Some("DONE".to_string()),
        });

        assert_eq!(overridden.max_iterations, 3);
        assert_eq!(overridden.max_steps, base.max_steps);
        assert_eq!(overridden.finish_marker, "DONE");
        // base stays untouched
        assert_eq!(base.max_iterations, 10);
        assert_eq!(base.finish_marker, "TERMINATE");
    }
}
