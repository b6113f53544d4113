// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shared Node Tasks
//!
//! The building blocks the protocol strategies assemble their graphs
//! from: member execution, bidding, market matching, finalization, and
//! the guard helpers for routing edges.
//!
//! Per-member instruction injection, prompt rewriting, and output
//! post-processing are all expressed as [`MemberTaskOptions`] so a
//! protocol configures behavior at graph-construction time and owns no
//! runtime state of its own.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use concord_core::application::decision::BID_KEY_PREFIX;
use concord_core::domain::context::{ExecutionContext, SharedContext, LAST_OUTPUT_KEY, TASK_KEY};
use concord_core::domain::graph::{GuardFn, NodeTask, TaskError};
use concord_core::domain::interceptor::{InterceptDecision, InterceptorChain};
use concord_core::domain::member::{MemberAgent, MemberRoster};
use concord_core::domain::trace::{Route, StepRole};

// ============================================================================
// Guard Helpers
// ============================================================================

/// Guard satisfied when the current route targets the named member.
pub fn member_guard(name: &str) -> GuardFn {
    let name = name.to_string();
    Arc::new(move |ctx: &ExecutionContext| {
        ctx.trace()
            .route
            .member_name()
            .map_or(false, |m| m.eq_ignore_ascii_case(&name))
    })
}

/// Guard satisfied when the current route targets the decision node.
pub fn router_guard() -> GuardFn {
    Arc::new(|ctx: &ExecutionContext| ctx.trace().route == Route::Router)
}

// ============================================================================
// Member Execution
// ============================================================================

/// How a member's output is post-processed into the next route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffMode {
    /// Routing is decided by the topology, not the member output.
    None,
    /// Swarm: a named peer wins; otherwise fall through to the decision
    /// step.
    PeerOrRouter,
    /// A2A: a named registered peer wins; anything else, including an
    /// unrecognized target, resolves to terminal (hallucination
    /// containment, no retry).
    Strict,
}

/// Per-member behavior configured by the protocol at graph-construction
/// time.
#[derive(Debug, Clone)]
pub struct MemberTaskOptions {
    /// Instruction injected ahead of the task text.
    pub instruction: Option<String>,
    pub handoff: HandoffMode,
    /// Count this member's turns against the iteration budget
    /// (decentralized protocols without a decision step per turn).
    pub count_iteration: bool,
    pub max_iterations: u32,
    pub finish_marker: String,
    /// Append the trace history to the member prompt.
    pub include_history: bool,
    /// Route written when a before-member hook vetoes this member,
    /// returning control to routing. `None` leaves the route untouched.
    pub veto_route: Option<Route>,
}

impl Default for MemberTaskOptions {
    fn default() -> Self {
        Self {
            instruction: None,
            handoff: HandoffMode::None,
            count_iteration: false,
            max_iterations: 10,
            finish_marker: "TERMINATE".to_string(),
            include_history: true,
            veto_route: None,
        }
    }
}

/// Activity node dispatching one member's `ask`.
pub struct MemberNodeTask {
    member: Arc<dyn MemberAgent>,
    roster: Arc<MemberRoster>,
    interceptors: Arc<InterceptorChain>,
    options: MemberTaskOptions,
}

impl MemberNodeTask {
    pub fn new(
        member: Arc<dyn MemberAgent>,
        roster: Arc<MemberRoster>,
        interceptors: Arc<InterceptorChain>,
        options: MemberTaskOptions,
    ) -> Self {
        Self {
            member,
            roster,
            interceptors,
            options,
        }
    }

    fn compose_prompt(&self, ctx: &ExecutionContext) -> String {
        let mut prompt = String::new();
        if let Some(instruction) = &self.options.instruction {
            prompt.push_str(instruction);
            prompt.push_str("\n\n");
        }
        if let Some(task) = ctx.get_str(TASK_KEY) {
            prompt.push_str(&format!("Task: {}\n", task));
        }
        if self.options.include_history && ctx.trace().record_count() > 0 {
            prompt.push_str("Progress so far:\n");
            prompt.push_str(&ctx.trace().format_history());
        }
        prompt
    }

    fn route_after(&self, output: &str) -> Option<Route> {
        let finished = output
            .to_lowercase()
            .contains(&self.options.finish_marker.to_lowercase());
        match self.options.handoff {
            HandoffMode::None => None,
            HandoffMode::PeerOrRouter => {
                if finished {
                    return Some(Route::Terminal);
                }
                match self
                    .roster
                    .find_matches(output, Some(self.member.name()))
                    .into_iter()
                    .next()
                {
                    Some(peer) => Some(Route::member(peer)),
                    None => Some(Route::Router),
                }
            }
            HandoffMode::Strict => {
                if finished {
                    return Some(Route::Terminal);
                }
                match self
                    .roster
                    .find_matches(output, Some(self.member.name()))
                    .into_iter()
                    .next()
                {
                    Some(peer) => Some(Route::member(peer)),
                    // Unrecognized target: contain rather than retry.
                    None => Some(Route::Terminal),
                }
            }
        }
    }
}

#[async_trait]
impl NodeTask for MemberNodeTask {
    async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        let name = self.member.name().to_string();

        if self.interceptors.before_member(&name, ctx).await? == InterceptDecision::Veto {
            debug!(member = %name, "member vetoed by interceptor");
            if let Some(route) = &self.options.veto_route {
                ctx.lock().await.trace_mut().route = route.clone();
            }
            return Ok(());
        }

        // A hook may have requested suspension; re-checked on re-entry.
        if ctx.lock().await.is_stopped() {
            return Ok(());
        }

        let prompt = {
            let guard = ctx.lock().await;
            self.compose_prompt(&guard)
        };

        let started = Instant::now();
        let output = self
            .member
            .ask(ctx, &prompt)
            .await
            .map_err(|e| TaskError::Member {
                member: name.clone(),
                reason: e.to_string(),
            })?;
        let duration_ms = started.elapsed().as_millis() as u64;

        {
            let mut guard = ctx.lock().await;
            guard
                .trace_mut()
                .add_step(name.clone(), StepRole::Member, output.clone(), duration_ms);
            guard.set(LAST_OUTPUT_KEY, json!(output.clone()));

            let mut forced_terminal = false;
            if self.options.count_iteration {
                guard.trace_mut().iteration_count += 1;
                if guard.trace().iteration_count >= self.options.max_iterations {
                    debug!(member = %name, "iteration budget reached");
                    forced_terminal = true;
                }
            }

            let route = if forced_terminal {
                Some(Route::Terminal)
            } else {
                self.route_after(&output)
            };
            if let Some(route) = route {
                debug!(member = %name, route = %route, "member routed");
                guard.trace_mut().route = route;
            }
        }

        self.interceptors.after_member(&name, &output, ctx).await?;
        Ok(())
    }
}

// ============================================================================
// Bidding (Contract-Net)
// ============================================================================

/// Broadcast leg of the Contract-Net bidding phase: ask one member for a
/// fitness self-assessment and record it as a bid.
pub struct BidTask {
    member: Arc<dyn MemberAgent>,
    interceptors: Arc<InterceptorChain>,
}

impl BidTask {
    pub fn new(member: Arc<dyn MemberAgent>, interceptors: Arc<InterceptorChain>) -> Self {
        Self {
            member,
            interceptors,
        }
    }
}

#[async_trait]
impl NodeTask for BidTask {
    async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        let name = self.member.name().to_string();

        if self.interceptors.before_member(&name, ctx).await? == InterceptDecision::Veto {
            debug!(member = %name, "bid vetoed by interceptor");
            return Ok(());
        }

        let prompt = {
            let guard = ctx.lock().await;
            format!(
                "State in one or two sentences how fit you are to take on this task and why.\nTask: {}",
                guard.get_str(TASK_KEY).unwrap_or_default()
            )
        };

        let started = Instant::now();
        let bid = self
            .member
            .ask(ctx, &prompt)
            .await
            .map_err(|e| TaskError::Member {
                member: name.clone(),
                reason: e.to_string(),
            })?;

        {
            let mut guard = ctx.lock().await;
            guard.trace_mut().add_step(
                name.clone(),
                StepRole::Member,
                format!("bid: {}", bid),
                started.elapsed().as_millis() as u64,
            );
            guard
                .trace_mut()
                .dashboard
                .set(format!("{}{}", BID_KEY_PREFIX, name), json!(bid.clone()));
        }

        self.interceptors.after_member(&name, &bid, ctx).await?;
        Ok(())
    }
}

// ============================================================================
// Market Matching
// ============================================================================

/// Single-shot algorithmic matching of the task text against member
/// profiles: explicit capability tags outrank free-text description
/// overlap. Below the threshold the run ends gracefully instead of
/// forcing an arbitrary pick.
pub struct MarketMatchTask {
    roster: Arc<MemberRoster>,
    threshold: u32,
}

/// Weight of one capability-tag hit relative to one description-word hit.
const TAG_WEIGHT: u32 = 10;

impl MarketMatchTask {
    pub fn new(roster: Arc<MemberRoster>, threshold: u32) -> Self {
        Self { roster, threshold }
    }

    fn score(&self, task: &str, member: &Arc<dyn MemberAgent>) -> u32 {
        let task_lower = task.to_lowercase();
        let task_words = words(&task_lower);

        let mut score = 0u32;
        if let Some(profile) = member.profile() {
            for capability in &profile.capabilities {
                if task_lower.contains(&capability.to_lowercase()) {
                    score += TAG_WEIGHT;
                }
            }
        }
        for word in words(&member.description().to_lowercase()) {
            if task_words.contains(&word) {
                score += 1;
            }
        }
        score
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl NodeTask for MarketMatchTask {
    async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        let started = Instant::now();
        let mut guard = ctx.lock().await;
        let task = guard.get_str(TASK_KEY).unwrap_or_default().to_string();

        let mut best: Option<(&Arc<dyn MemberAgent>, u32)> = None;
        for member in self.roster.iter() {
            let score = self.score(&task, member);
            debug!(member = member.name(), score, "market match score");
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((member, score));
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        match best.filter(|(_, score)| *score >= self.threshold.max(1)) {
            Some((member, score)) => {
                guard.trace_mut().add_step(
                    "MARKET",
                    StepRole::Router,
                    format!("matched {} (score {})", member.name(), score),
                    duration_ms,
                );
                guard.trace_mut().route = Route::member(member.name());
            }
            None => {
                guard.trace_mut().add_step(
                    "MARKET",
                    StepRole::Router,
                    "no member cleared the match threshold",
                    duration_ms,
                );
                guard.trace_mut().final_answer =
                    Some("No suitable member found for this task.".to_string());
                guard.trace_mut().route = Route::Terminal;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Finalization
// ============================================================================

/// END-node task: pins the terminal route and fills the final answer from
/// the last member output when nothing set one explicitly.
pub struct FinalizeTask;

#[async_trait]
impl NodeTask for FinalizeTask {
    async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        let mut guard = ctx.lock().await;
        guard.trace_mut().route = Route::Terminal;
        if guard.trace().final_answer.is_none() {
            let answer = guard.trace().last_member_content().map(str::to_string);
            guard.trace_mut().final_answer = answer;
        }
        Ok(())
    }
}
