// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Collaboration Trace — Domain Model
//!
//! The append-only ledger of a coordination run: every member and router
//! step, the current routing state, the iteration counter, and the
//! protocol-private dashboard.
//!
//! # Invariants
//!
//! - Step records are never mutated after being appended; the dashboard is
//!   the only mutable region and overwrites by key (last-write-wins).
//! - `route` always holds a reserved control target, a member name placed
//!   there by protocol-level validation, or the terminal sentinel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Routing state carried between nodes of a coordination graph.
///
/// The closed set of variants enforces the routing invariant by
/// construction: a `Member` route is only written by protocol code that has
/// validated the name against the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// Initial state before any routing decision.
    Start,
    /// Hand control to the central decision node.
    Router,
    /// Hand control to the bidding phase (Contract-Net).
    Bidding,
    /// Hand control to a specific registered member.
    Member { name: String },
    /// Terminal sentinel: the run is done.
    Terminal,
}

impl Route {
    /// Build a member route.
    pub fn member(name: impl Into<String>) -> Self {
        Self::Member { name: name.into() }
    }

    /// The member name if this is a member route.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            Self::Member { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::Start
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Router => write!(f, "ROUTER"),
            Self::Bidding => write!(f, "BIDDING"),
            Self::Member { name } => write!(f, "{}", name),
            Self::Terminal => write!(f, "TERMINAL"),
        }
    }
}

/// Who produced a step record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    /// A member agent's answer.
    Member,
    /// A routing decision (router, award, market match).
    Router,
    /// Engine or protocol housekeeping.
    System,
}

/// One entry in the collaboration ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub source: String,
    pub role: StepRole,
    pub content: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Protocol-private key/value state carried inside the trace.
///
/// Writers overwrite previous values for the same key; there is no value
/// merging. The Blackboard protocol exposes this region directly to
/// members; Contract-Net records bids here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dashboard {
    data: BTreeMap<String, serde_json::Value>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    /// Get a value from the dashboard.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Set a value, overwriting any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Remove a value from the dashboard.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// All entries, in key order.
    pub fn data(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.data
    }

    /// Entries whose key starts with `prefix`, in key order.
    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a serde_json::Value)> {
        self.data.iter().filter(move |(k, _)| k.starts_with(prefix))
    }

    /// Clear all entries.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Ordered record of what happened during one collaboration run.
///
/// One trace exists per session. It is reset only when a new user prompt
/// explicitly starts a new task (`begin_task`), never by resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaborationTrace {
    steps: Vec<StepRecord>,
    pub route: Route,
    pub iteration_count: u32,
    pub final_answer: Option<String>,
    pub dashboard: Dashboard,
}

impl CollaborationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the trace for a new user task.
    pub fn begin_task(&mut self) {
        self.steps.clear();
        self.route = Route::Start;
        self.iteration_count = 0;
        self.final_answer = None;
        self.dashboard.clear();
    }

    /// Append a step record. Past records are never mutated.
    pub fn add_step(
        &mut self,
        source: impl Into<String>,
        role: StepRole,
        content: impl Into<String>,
        duration_ms: u64,
    ) {
        self.steps.push(StepRecord {
            source: source.into(),
            role,
            content: content.into(),
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn record_count(&self) -> usize {
        self.steps.len()
    }

    pub fn last_step(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    /// Source of the most recent member-role step.
    pub fn last_member_source(&self) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.role == StepRole::Member)
            .map(|s| s.source.as_str())
    }

    /// Content of the most recent member-role step, falling back to the
    /// most recent step of any role.
    pub fn last_member_content(&self) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.role == StepRole::Member)
            .map(|s| s.content.as_str())
            .or_else(|| self.last_step().map(|s| s.content.as_str()))
    }

    /// Advisory loop heuristic. Not enforced by the engine; protocols and
    /// interceptors may use it to escalate or conclude.
    ///
    /// Returns true when the last 3 step sources are identical
    /// (stuck-in-place), or when the last 4 steps show an alternating
    /// two-cycle (A,B,A,B).
    pub fn is_looping(&self) -> bool {
        let n = self.steps.len();
        if n >= 3 {
            let tail = &self.steps[n - 3..];
            if tail[0].source == tail[1].source && tail[1].source == tail[2].source {
                return true;
            }
        }
        if n >= 4 {
            let tail = &self.steps[n - 4..];
            if tail[0].source == tail[2].source
                && tail[1].source == tail[3].source
                && tail[0].source != tail[1].source
            {
                return true;
            }
        }
        false
    }

    /// Render the ledger as routing-prompt history.
    pub fn format_history(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(&format!("[{}] {}\n", step.source, step.content));
        }
        out
    }
}
