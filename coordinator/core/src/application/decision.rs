// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Task Application Service
//!
//! Centralized routing: assemble the roster, the task, protocol guidance,
//! and the trace history into one instruction; call the decision oracle
//! once; parse the free-text answer leniently into a [`Route`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Oracle-backed routing decisions with graceful degradation
//!
//! Routing errors are contained locally: an unparsable, hallucinated, or
//! failed oracle response degrades to the terminal route and is never
//! raised to the caller.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::domain::context::{SharedContext, TASK_KEY};
use crate::domain::graph::{NodeTask, TaskError, ROUTER_NODE};
use crate::domain::interceptor::{InterceptDecision, InterceptorChain};
use crate::domain::member::MemberRoster;
use crate::domain::oracle::DecisionOracle;
use crate::domain::protocol::{CoordinationConfig, RetryPolicy};
use crate::domain::trace::{Route, StepRole};

/// Dashboard key prefix under which Contract-Net bids are recorded.
pub const BID_KEY_PREFIX: &str = "bid:";

/// Maps an oracle phrase onto a reserved control route, declared by the
/// protocol (e.g. "begin bidding" → [`Route::Bidding`]).
#[derive(Debug, Clone)]
pub struct ControlToken {
    pub token: String,
    pub route: Route,
}

/// Configuration for one decision node.
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub max_iterations: u32,
    pub finish_marker: String,
    /// Protocol-specific guidance text injected into the instruction.
    pub guidance: String,
    pub control_tokens: Vec<ControlToken>,
    /// Bias against immediately re-selecting the most recent member
    /// (Swarm). A lone match is never overridden.
    pub recency_bias: bool,
    /// Append recorded bids from the dashboard to the instruction.
    pub include_bids: bool,
    /// Refuse to decide before at least one bid exists (Contract-Net
    /// award: bidding is always recorded first).
    pub require_bids: bool,
    pub retry: RetryPolicy,
}

impl DecisionConfig {
    pub fn from_coordination(config: &CoordinationConfig, guidance: impl Into<String>) -> Self {
        Self {
            max_iterations: config.max_iterations,
            finish_marker: config.finish_marker.clone(),
            guidance: guidance.into(),
            control_tokens: Vec::new(),
            recency_bias: false,
            include_bids: false,
            require_bids: false,
            retry: config.oracle_retry.clone(),
        }
    }
}

/// Oracle-backed routing node. Used by protocols that centralize routing
/// (Hierarchical, Contract-Net award) and as the Swarm fallback.
pub struct DecisionTask {
    oracle: Arc<dyn DecisionOracle>,
    roster: Arc<MemberRoster>,
    interceptors: Arc<InterceptorChain>,
    config: DecisionConfig,
}

impl DecisionTask {
    pub fn new(
        oracle: Arc<dyn DecisionOracle>,
        roster: Arc<MemberRoster>,
        interceptors: Arc<InterceptorChain>,
        config: DecisionConfig,
    ) -> Self {
        Self {
            oracle,
            roster,
            interceptors,
            config,
        }
    }

    fn render_instruction(&self, task: Option<&str>, bids: &[(String, String)], looping: bool) -> String {
        let mut out = String::from(
            "You coordinate a team of member agents working jointly on one task.\n",
        );
        out.push_str("Members:\n");
        out.push_str(&self.roster.roster_block());
        if let Some(task) = task {
            out.push_str(&format!("Task: {}\n", task));
        }
        if !self.config.guidance.is_empty() {
            out.push_str(&self.config.guidance);
            out.push('\n');
        }
        if self.config.include_bids && !bids.is_empty() {
            out.push_str("Recorded bids:\n");
            for (member, bid) in bids {
                out.push_str(&format!("- {}: {}\n", member, bid));
            }
        }
        if looping {
            out.push_str("The collaboration appears to be looping; prefer concluding.\n");
        }
        out.push_str(&format!(
            "Reply with the name of the single member best suited to act next, or \"{}\" when the task is complete.\n",
            self.config.finish_marker
        ));
        out
    }

    async fn call_with_retry(&self, instruction: &str, history: &str) -> Result<String, crate::domain::oracle::OracleError> {
        let attempts = self.config.retry.max_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.oracle.decide(instruction, history).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    warn!(attempt, error = %err, "decision oracle call failed");
                    last_err = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(self.config.retry.delay_ms)).await;
                    }
                }
            }
        }
        Err(last_err.expect("at least one attempt was made"))
    }
}

#[async_trait]
impl NodeTask for DecisionTask {
    async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        let started = Instant::now();

        // Iteration budget check runs before the oracle is consulted and
        // the counter increments exactly once per invocation, including
        // the short-circuited case.
        {
            let mut guard = ctx.lock().await;
            let over_budget = guard.trace().iteration_count >= self.config.max_iterations;
            guard.trace_mut().iteration_count += 1;
            if over_budget {
                debug!("iteration budget exhausted, routing to terminal");
                guard.trace_mut().route = Route::Terminal;
                return Ok(());
            }

            if self.config.require_bids
                && guard
                    .trace()
                    .dashboard
                    .entries_with_prefix(BID_KEY_PREFIX)
                    .next()
                    .is_none()
            {
                return Err(TaskError::Failed(
                    "award requested before any bid was recorded".to_string(),
                ));
            }
        }

        if self.interceptors.before_decision(ctx).await? == InterceptDecision::Veto {
            debug!("decision vetoed by interceptor, routing to terminal");
            ctx.lock().await.trace_mut().route = Route::Terminal;
            return Ok(());
        }

        // A hook may have requested suspension; nothing further runs.
        if ctx.lock().await.is_stopped() {
            return Ok(());
        }

        let (instruction, history, last_member) = {
            let guard = ctx.lock().await;
            let bids: Vec<(String, String)> = guard
                .trace()
                .dashboard
                .entries_with_prefix(BID_KEY_PREFIX)
                .map(|(k, v)| {
                    (
                        k.trim_start_matches(BID_KEY_PREFIX).to_string(),
                        v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()),
                    )
                })
                .collect();
            (
                self.render_instruction(guard.get_str(TASK_KEY), &bids, guard.trace().is_looping()),
                guard.trace().format_history(),
                guard.trace().last_member_source().map(str::to_string),
            )
        };

        let response = match self.call_with_retry(&instruction, &history).await {
            Ok(text) => text,
            Err(err) => {
                // Contained: degrade to terminal rather than raising.
                warn!(error = %err, "decision oracle unavailable, degrading to terminal route");
                let mut guard = ctx.lock().await;
                guard.trace_mut().add_step(
                    ROUTER_NODE,
                    StepRole::Router,
                    format!("oracle unavailable: {}", err),
                    started.elapsed().as_millis() as u64,
                );
                guard.trace_mut().route = Route::Terminal;
                return Ok(());
            }
        };

        let route = parse_route(&response, &self.roster, &self.config, last_member.as_deref());
        debug!(route = %route, "decision parsed");

        {
            let mut guard = ctx.lock().await;
            guard.trace_mut().add_step(
                ROUTER_NODE,
                StepRole::Router,
                response,
                started.elapsed().as_millis() as u64,
            );
            guard.trace_mut().route = route;
        }

        self.interceptors.after_decision(ctx).await?;
        Ok(())
    }
}

/// Lenient parse of a free-text oracle response into a route.
///
/// Precedence: protocol control tokens, then the finish marker, then the
/// longest registered member name found as a case-insensitive substring
/// (disambiguates names that are substrings of one another). Nothing
/// matching degrades to the terminal route rather than inventing a target.
pub fn parse_route(
    response: &str,
    roster: &MemberRoster,
    config: &DecisionConfig,
    last_member: Option<&str>,
) -> Route {
    let lowered = response.to_lowercase();

    for control in &config.control_tokens {
        if lowered.contains(&control.token.to_lowercase()) {
            return control.route.clone();
        }
    }

    if lowered.contains(&config.finish_marker.to_lowercase()) {
        return Route::Terminal;
    }

    let matches = roster.find_matches(response, None);
    if matches.is_empty() {
        return Route::Terminal;
    }

    if config.recency_bias && matches.len() > 1 {
        if let Some(last) = last_member {
            if matches[0].eq_ignore_ascii_case(last) {
                return Route::member(matches[1].clone());
            }
        }
    }

    Route::member(matches[0].clone())
}
