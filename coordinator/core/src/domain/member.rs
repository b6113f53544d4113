// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Member Agent Contract — Domain Model
//!
//! The external collaborator contract for one worker: a stable name, a
//! description used for routing, an optional capability profile, and the
//! `ask` operation. Members are immutable once registered into a
//! [`MemberRoster`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::context::SharedContext;

/// One supported input/output mode of a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionMode {
    pub input: String,
    pub output: String,
}

/// Optional capability profile advertised by a member, used by routing and
/// by the market-based protocol's tag matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentProfile {
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub constraints: Vec<String>,

    #[serde(default)]
    pub modes: Vec<InteractionMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl AgentProfile {
    /// One-line rendering for routing prompts.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.capabilities.is_empty() {
            parts.push(format!("capabilities: {}", self.capabilities.join(", ")));
        }
        if !self.constraints.is_empty() {
            parts.push(format!("constraints: {}", self.constraints.join(", ")));
        }
        if let Some(style) = &self.style {
            parts.push(format!("style: {}", style));
        }
        parts.join("; ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MemberError {
    #[error("member task failed: {0}")]
    Task(String),

    #[error("member unavailable: {0}")]
    Unavailable(String),
}

/// An independently callable worker capable of answering a sub-task.
///
/// `name` must be unique and stable; `description` is stable and feeds the
/// routing prompts. `ask` receives the shared context explicitly so members
/// can read and write the dashboard (Blackboard protocol) without any
/// ambient lookup.
#[async_trait]
pub trait MemberAgent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn profile(&self) -> Option<AgentProfile> {
        None
    }

    async fn ask(&self, ctx: &SharedContext, prompt: &str) -> Result<String, MemberError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("member name cannot be empty")]
    EmptyName,

    #[error("duplicate member name '{0}'")]
    Duplicate(String),

    #[error("no members registered")]
    Empty,
}

/// Registration-ordered collection of members.
///
/// Registration order is meaningful: Sequential chains members in this
/// order and Swarm/A2A enter at the first registered member.
#[derive(Clone, Default)]
pub struct MemberRoster {
    members: Vec<Arc<dyn MemberAgent>>,
}

impl MemberRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member. Names must be unique (case-insensitive).
    pub fn register(&mut self, member: Arc<dyn MemberAgent>) -> Result<(), RosterError> {
        let name = member.name().to_string();
        if name.is_empty() {
            return Err(RosterError::EmptyName);
        }
        if self.contains(&name) {
            return Err(RosterError::Duplicate(name));
        }
        self.members.push(member);
        Ok(())
    }

    /// Build a roster from a member list, rejecting duplicates.
    pub fn from_members(
        members: impl IntoIterator<Item = Arc<dyn MemberAgent>>,
    ) -> Result<Self, RosterError> {
        let mut roster = Self::new();
        for member in members {
            roster.register(member)?;
        }
        if roster.is_empty() {
            return Err(RosterError::Empty);
        }
        Ok(roster)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MemberAgent>> {
        self.members.iter()
    }

    pub fn first(&self) -> Option<&Arc<dyn MemberAgent>> {
        self.members.first()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn MemberAgent>> {
        self.members
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name()).collect()
    }

    /// Registered member names found as case-insensitive substrings of
    /// `text`, longest name first (disambiguates names that are substrings
    /// of one another). `exclude` removes one member from consideration,
    /// used when a member scans its own output for a handoff target.
    pub fn find_matches(&self, text: &str, exclude: Option<&str>) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut names: Vec<&str> = self
            .members
            .iter()
            .map(|m| m.name())
            .filter(|n| exclude.map_or(true, |ex| !n.eq_ignore_ascii_case(ex)))
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()));
        names
            .into_iter()
            .filter(|n| lowered.contains(&n.to_lowercase()))
            .map(str::to_string)
            .collect()
    }

    /// Roster rendering for routing prompts: one line per member with
    /// description and profile summary.
    pub fn roster_block(&self) -> String {
        let mut out = String::new();
        for member in &self.members {
            out.push_str(&format!("- {}: {}", member.name(), member.description()));
            if let Some(profile) = member.profile() {
                let summary = profile.summary();
                if !summary.is_empty() {
                    out.push_str(&format!(" ({})", summary));
                }
            }
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Debug for MemberRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberRoster")
            .field("members", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubMember {
        name: &'static str,
    }

    #[async_trait]
    impl MemberAgent for StubMember {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        async fn ask(&self, _ctx: &SharedContext, _prompt: &str) -> Result<String, MemberError> {
            Ok("ok".to_string())
        }
    }

    fn roster(names: &[&'static str]) -> MemberRoster {
        MemberRoster::from_members(
            names
                .iter()
                .map(|n| Arc::new(StubMember { name: *n }) as Arc<dyn MemberAgent>),
        )
        .expect("valid roster")
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut r = MemberRoster::new();
        r.register(Arc::new(StubMember { name: "coder" })).unwrap();
        let result = r.register(Arc::new(StubMember { name: "coder" }));
        assert!(matches!(result, Err(RosterError::Duplicate(_))));
    }

    #[test]
    fn test_empty_roster_rejected() {
        let result = MemberRoster::from_members(Vec::new());
        assert!(matches!(result, Err(RosterError::Empty)));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let r = roster(&["Researcher"]);
        assert!(r.contains("researcher"));
        assert!(r.get("RESEARCHER").is_some());
    }

    #[test]
    fn test_find_matches_prefers_longest_name() {
        let r = roster(&["research", "researcher"]);
        let matches = r.find_matches("send this to the researcher please", None);
        assert_eq!(matches[0], "researcher");
        // the shorter name also occurs as a substring
        assert_eq!(matches[1], "research");
    }

    #[test]
    fn test_find_matches_excludes_self() {
        let r = roster(&["alpha", "beta"]);
        let matches = r.find_matches("alpha hands off to beta", Some("alpha"));
        assert_eq!(matches, vec!["beta".to_string()]);
    }

    #[test]
    fn test_find_matches_none_for_unknown_target() {
        let r = roster(&["alpha", "beta"]);
        assert!(r.find_matches("route this to zeus", None).is_empty());
    }
}
