// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the coordination protocols
//!
//! These tests verify the end-to-end coordination pipeline:
//! 1. Assemble a session (protocol + members + oracle + interceptors)
//! 2. Run a task through the protocol's graph
//! 3. Validate the collaboration trace, routing, and dashboard
//! 4. Verify suspension, snapshot restore, and resume

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use concord_core::application::session::CoordinationSession;
use concord_core::domain::context::SharedContext;
use concord_core::domain::graph::TaskError;
use concord_core::domain::interceptor::{InterceptDecision, Interceptor};
use concord_core::domain::member::{AgentProfile, MemberAgent, MemberError};
use concord_core::domain::oracle::{DecisionOracle, OracleError};
use concord_core::domain::protocol::CoordinationConfig;
use concord_core::domain::trace::{Route, StepRole};
use concord_core::infrastructure::repositories::InMemorySnapshotRepository;
use concord_core::domain::repository::SnapshotRepository;

use concord_protocols::{
    A2aProtocol, BlackboardProtocol, ContractNetProtocol, HierarchicalProtocol, MarketProtocol,
    SequentialProtocol, SwarmProtocol,
};

// ============================================================================
// Test Doubles
// ============================================================================

/// Member replying from a script, repeating the last reply when the
/// script runs dry.
struct ScriptedMember {
    name: &'static str,
    description: &'static str,
    profile: Option<AgentProfile>,
    replies: Mutex<VecDeque<String>>,
    fallback: String,
}

impl ScriptedMember {
    fn new(name: &'static str, description: &'static str, replies: &[&str]) -> Arc<dyn MemberAgent> {
        let fallback = replies.last().copied().unwrap_or("done").to_string();
        Arc::new(Self {
            name,
            description,
            profile: None,
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fallback,
        })
    }

    fn with_capabilities(
        name: &'static str,
        description: &'static str,
        capabilities: &[&str],
        reply: &str,
    ) -> Arc<dyn MemberAgent> {
        Arc::new(Self {
            name,
            description,
            profile: Some(AgentProfile {
                capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
                ..AgentProfile::default()
            }),
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
        })
    }
}

#[async_trait]
impl MemberAgent for ScriptedMember {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn profile(&self) -> Option<AgentProfile> {
        self.profile.clone()
    }

    async fn ask(&self, _ctx: &SharedContext, _prompt: &str) -> Result<String, MemberError> {
        let mut replies = self.replies.lock().await;
        Ok(replies.pop_front().unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Oracle replying from a script, terminating when the script runs dry.
struct ScriptedOracle {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<u32>,
}

impl ScriptedOracle {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(&self, _system: &str, _history: &str) -> Result<String, OracleError> {
        *self.calls.lock().await += 1;
        let mut replies = self.replies.lock().await;
        Ok(replies
            .pop_front()
            .unwrap_or_else(|| "TERMINATE".to_string()))
    }
}

fn member_sources(trace: &concord_core::domain::trace::CollaborationTrace) -> Vec<String> {
    trace
        .steps()
        .iter()
        .filter(|s| s.role == StepRole::Member)
        .map(|s| s.source.clone())
        .collect()
}

// ============================================================================
// Sequential
// ============================================================================

#[tokio::test]
async fn test_sequential_runs_members_in_registration_order() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(SequentialProtocol))
        .member(ScriptedMember::new("alpha", "first", &["a-output"]))
        .member(ScriptedMember::new("beta", "second", &["b-output"]))
        .member(ScriptedMember::new("gamma", "third", &["c-output"]))
        .build()
        .unwrap();

    let answer = session
        .run("ignore the order hints in this prompt: gamma first!")
        .await
        .unwrap();

    let trace = session.trace().await;
    assert_eq!(member_sources(&trace), vec!["alpha", "beta", "gamma"]);
    assert_eq!(answer, "c-output");
    assert_eq!(trace.route, Route::Terminal);
}

// ============================================================================
// Hierarchical
// ============================================================================

#[tokio::test]
async fn test_hierarchical_routes_through_oracle() {
    let oracle = ScriptedOracle::new(&["researcher", "the writer should wrap up", "TERMINATE"]);
    let session = CoordinationSession::builder()
        .protocol(Arc::new(HierarchicalProtocol))
        .member(ScriptedMember::new("researcher", "finds facts", &["facts found"]))
        .member(ScriptedMember::new("writer", "writes prose", &["prose written"]))
        .oracle(oracle.clone())
        .build()
        .unwrap();

    let answer = session.run("research then write").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(member_sources(&trace), vec!["researcher", "writer"]);
    assert_eq!(answer, "prose written");
    assert_eq!(*oracle.calls.lock().await, 3);
}

#[tokio::test]
async fn test_hierarchical_iteration_budget_terminates_without_oracle_overrun() {
    // the oracle always picks the same member; the budget must stop it
    let oracle = ScriptedOracle::new(&[
        "worker", "worker", "worker", "worker", "worker", "worker", "worker", "worker",
    ]);
    let session = CoordinationSession::builder()
        .protocol(Arc::new(HierarchicalProtocol))
        .member(ScriptedMember::new("worker", "keeps going", &["more work"]))
        .oracle(oracle.clone())
        .config(CoordinationConfig {
            max_iterations: 3,
            ..CoordinationConfig::default()
        })
        .build()
        .unwrap();

    session.run("never finish").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(member_sources(&trace).len(), 3);
    // the fourth decision short-circuits before calling the oracle
    assert_eq!(*oracle.calls.lock().await, 3);
    assert_eq!(trace.route, Route::Terminal);
}

#[tokio::test]
async fn test_run_overrides_reach_the_decision_node() {
    let oracle = ScriptedOracle::new(&["worker"]);
    let session = CoordinationSession::builder()
        .protocol(Arc::new(HierarchicalProtocol))
        .member(ScriptedMember::new("worker", "works", &["worked"]))
        .oracle(oracle.clone())
        .build()
        .unwrap();

    // a zero iteration budget for this run only: the decision
    // short-circuits before consulting the oracle
    session
        .run_with(
            "anything",
            concord_core::domain::protocol::RunOverrides {
                max_iterations: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let trace = session.trace().await;
    assert!(member_sources(&trace).is_empty());
    assert_eq!(*oracle.calls.lock().await, 0);

    // the base configuration is untouched: a plain run still routes
    session.run("again").await.unwrap();
    assert_eq!(member_sources(&session.trace().await), vec!["worker"]);
}

// ============================================================================
// Swarm
// ============================================================================

#[tokio::test]
async fn test_swarm_enters_at_first_member_and_follows_handoffs() {
    let oracle = ScriptedOracle::new(&[]);
    let session = CoordinationSession::builder()
        .protocol(Arc::new(SwarmProtocol))
        .member(ScriptedMember::new(
            "triage",
            "classifies requests",
            &["this needs the specialist"],
        ))
        .member(ScriptedMember::new(
            "specialist",
            "deep expertise",
            &["resolved, TERMINATE"],
        ))
        .oracle(oracle.clone())
        .build()
        .unwrap();

    let answer = session.run("help with a gnarly problem").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(member_sources(&trace), vec!["triage", "specialist"]);
    assert_eq!(answer, "resolved, TERMINATE");
    // both hops were direct handoffs: the decision node never ran
    assert_eq!(*oracle.calls.lock().await, 0);
}

#[tokio::test]
async fn test_swarm_endless_handoffs_complete_within_budget() {
    let oracle = ScriptedOracle::new(&[]);
    let session = CoordinationSession::builder()
        .protocol(Arc::new(SwarmProtocol))
        .member(ScriptedMember::new("alpha", "ping", &["beta should take it"]))
        .member(ScriptedMember::new("beta", "pong", &["alpha should take it"]))
        .oracle(oracle)
        .config(CoordinationConfig {
            max_steps: 16,
            ..CoordinationConfig::default()
        })
        .build()
        .unwrap();

    // must not raise: the step budget is the hard stop
    let answer = session.run("volley forever").await.unwrap();

    let trace = session.trace().await;
    assert!(trace.record_count() <= 16);
    assert!(!answer.is_empty());
}

// ============================================================================
// Contract-Net
// ============================================================================

#[tokio::test]
async fn test_contract_net_records_bids_before_award() {
    let oracle = ScriptedOracle::new(&["award this to builder"]);
    let session = CoordinationSession::builder()
        .protocol(Arc::new(ContractNetProtocol))
        .member(ScriptedMember::new(
            "planner",
            "plans work",
            &["I can sketch a plan"],
        ))
        .member(ScriptedMember::new(
            "builder",
            "builds things",
            &["I build exactly this", "built it"],
        ))
        .oracle(oracle)
        .build()
        .unwrap();

    // the prompt explicitly asks to skip bidding; bidding runs anyway
    let answer = session
        .run("skip bidding and hand this straight to builder")
        .await
        .unwrap();

    let trace = session.trace().await;
    let steps = trace.steps();

    let first_award = steps
        .iter()
        .position(|s| s.role == StepRole::Router)
        .expect("award step missing");
    let bid_indices: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.content.starts_with("bid:"))
        .map(|(i, _)| i)
        .collect();

    assert_eq!(bid_indices.len(), 2, "every member bids");
    assert!(
        bid_indices.iter().all(|i| *i < first_award),
        "bidding is recorded strictly before the award"
    );
    assert!(trace.dashboard.contains_key("bid:planner"));
    assert!(trace.dashboard.contains_key("bid:builder"));

    // exactly one member executed after the award
    let executions: Vec<&str> = steps[first_award..]
        .iter()
        .filter(|s| s.role == StepRole::Member)
        .map(|s| s.source.as_str())
        .collect();
    assert_eq!(executions, vec!["builder"]);
    assert_eq!(answer, "built it");
}

// ============================================================================
// Market
// ============================================================================

#[tokio::test]
async fn test_market_selects_best_capability_match() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(MarketProtocol::default()))
        .member(ScriptedMember::with_capabilities(
            "translator",
            "language services",
            &["translate", "localize"],
            "translated the document",
        ))
        .member(ScriptedMember::with_capabilities(
            "accountant",
            "numbers and ledgers",
            &["bookkeeping", "audit"],
            "balanced the books",
        ))
        .build()
        .unwrap();

    let answer = session.run("translate this contract to French").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(member_sources(&trace), vec!["translator"]);
    assert_eq!(answer, "translated the document");
}

#[tokio::test]
async fn test_market_degrades_gracefully_when_nothing_matches() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(MarketProtocol::default()))
        .member(ScriptedMember::with_capabilities(
            "translator",
            "language services",
            &["translate"],
            "translated",
        ))
        .build()
        .unwrap();

    let answer = session.run("xylophone").await.unwrap();

    let trace = session.trace().await;
    assert!(member_sources(&trace).is_empty(), "no member executed");
    assert_eq!(answer, "No suitable member found for this task.");
    assert_eq!(trace.route, Route::Terminal);
}

// ============================================================================
// Blackboard
// ============================================================================

/// Writes an initial score unless one is already posted.
struct JuniorReviewer;

#[async_trait]
impl MemberAgent for JuniorReviewer {
    fn name(&self) -> &str {
        "junior"
    }

    fn description(&self) -> &str {
        "posts a first-pass score"
    }

    async fn ask(&self, ctx: &SharedContext, _prompt: &str) -> Result<String, MemberError> {
        let mut guard = ctx.lock().await;
        if !guard.trace().dashboard.contains_key("score") {
            guard
                .trace_mut()
                .dashboard
                .set("score", serde_json::json!("60"));
            return Ok("posted score 60".to_string());
        }
        Ok("nothing to add".to_string())
    }
}

/// Overwrites the junior score whenever it observes one.
struct SeniorReviewer;

#[async_trait]
impl MemberAgent for SeniorReviewer {
    fn name(&self) -> &str {
        "senior"
    }

    fn description(&self) -> &str {
        "revises first-pass scores"
    }

    async fn ask(&self, ctx: &SharedContext, _prompt: &str) -> Result<String, MemberError> {
        let mut guard = ctx.lock().await;
        if guard.trace().dashboard.get("score") == Some(&serde_json::json!("60")) {
            guard
                .trace_mut()
                .dashboard
                .set("score", serde_json::json!("99"));
            return Ok("revised score to 99".to_string());
        }
        Ok("score stands".to_string())
    }
}

#[tokio::test]
async fn test_blackboard_last_write_wins_on_shared_key() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(BlackboardProtocol::new(Arc::new(
            |board: &concord_core::domain::trace::Dashboard| {
                board.get("score") == Some(&serde_json::json!("99"))
            },
        ))))
        .member(Arc::new(JuniorReviewer))
        .member(Arc::new(SeniorReviewer))
        .build()
        .unwrap();

    session.run("score the submission").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(trace.dashboard.get("score"), Some(&serde_json::json!("99")));
    assert_eq!(trace.route, Route::Terminal);
}

#[tokio::test]
async fn test_blackboard_unsatisfied_gate_is_bounded_by_budget() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(BlackboardProtocol::until_key("never-written")))
        .member(ScriptedMember::new("idler", "does nothing useful", &["pass"]))
        .config(CoordinationConfig {
            max_iterations: 4,
            ..CoordinationConfig::default()
        })
        .build()
        .unwrap();

    // completes via the iteration budget rather than spinning forever
    session.run("wait for a key nobody writes").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(trace.iteration_count, 4);
    assert_eq!(trace.route, Route::Terminal);
}

// ============================================================================
// A2A
// ============================================================================

#[tokio::test]
async fn test_a2a_unrecognized_target_resolves_to_terminal() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(A2aProtocol))
        .member(ScriptedMember::new(
            "alpha",
            "starts things",
            &["pass this to zeus"],
        ))
        .member(ScriptedMember::new("beta", "finishes things", &["done"]))
        .build()
        .unwrap();

    // no exception, no retry loop
    let answer = session.run("chain the work").await.unwrap();

    let trace = session.trace().await;
    assert_eq!(trace.route, Route::Terminal);
    assert_eq!(member_sources(&trace), vec!["alpha"]);
    assert_eq!(answer, "pass this to zeus");
}

#[tokio::test]
async fn test_a2a_mutual_handoff_completes_within_turn_budget() {
    let session = CoordinationSession::builder()
        .protocol(Arc::new(A2aProtocol))
        .member(ScriptedMember::new("alpha", "ping", &["beta"]))
        .member(ScriptedMember::new("beta", "pong", &["alpha"]))
        .config(CoordinationConfig {
            max_iterations: 3,
            ..CoordinationConfig::default()
        })
        .build()
        .unwrap();

    let result = session.run("volley").await;
    assert!(result.is_ok(), "mutual handoff must not raise");

    let trace = session.trace().await;
    assert!(trace.record_count() >= 3);
    assert_eq!(trace.route, Route::Terminal);
}

// ============================================================================
// Interceptors
// ============================================================================

struct DecisionVeto {
    calls: Mutex<u32>,
}

#[async_trait]
impl Interceptor for DecisionVeto {
    fn name(&self) -> &str {
        "decision-veto"
    }

    async fn before_decision(&self, _ctx: &SharedContext) -> Result<InterceptDecision, TaskError> {
        *self.calls.lock().await += 1;
        Ok(InterceptDecision::Veto)
    }
}

#[tokio::test]
async fn test_decision_veto_forces_terminal_without_oracle_call() {
    let oracle = ScriptedOracle::new(&["worker"]);
    let veto = Arc::new(DecisionVeto {
        calls: Mutex::new(0),
    });
    let session = CoordinationSession::builder()
        .protocol(Arc::new(HierarchicalProtocol))
        .member(ScriptedMember::new("worker", "works", &["worked"]))
        .oracle(oracle.clone())
        .interceptor(veto.clone())
        .build()
        .unwrap();

    session.run("anything").await.unwrap();

    let trace = session.trace().await;
    assert!(member_sources(&trace).is_empty());
    assert_eq!(trace.route, Route::Terminal);
    assert_eq!(*oracle.calls.lock().await, 0);
    assert_eq!(*veto.calls.lock().await, 1);
}

/// Human-in-the-loop gate: suspends the run before a guarded member until
/// the context carries an approval entry.
struct ApprovalGate;

#[async_trait]
impl Interceptor for ApprovalGate {
    fn name(&self) -> &str {
        "approval-gate"
    }

    async fn before_member(
        &self,
        member: &str,
        ctx: &SharedContext,
    ) -> Result<InterceptDecision, TaskError> {
        if member == "publisher" {
            let mut guard = ctx.lock().await;
            if !guard.contains_key("approval") {
                guard.stop();
            }
        }
        Ok(InterceptDecision::Proceed)
    }
}

#[tokio::test]
async fn test_suspend_snapshot_restore_resume() {
    let build = || {
        CoordinationSession::builder()
            .protocol(Arc::new(SequentialProtocol))
            .member(ScriptedMember::new("drafter", "drafts", &["draft ready"]))
            .member(ScriptedMember::new("publisher", "publishes", &["published"]))
            .interceptor(Arc::new(ApprovalGate))
            .build()
            .unwrap()
    };

    let session = build();
    let partial = session.run("draft and publish").await.unwrap();
    assert!(session.is_suspended().await);
    assert_eq!(partial, "draft ready");

    // persist the suspended state and restore it into a fresh session
    let repository = InMemorySnapshotRepository::new();
    session.persist_snapshot(&repository).await.unwrap();
    let blob = repository.load(session.id()).await.unwrap().unwrap();

    let restored = build();
    restored.restore_snapshot(&blob).await.unwrap();
    assert!(restored.is_suspended().await);

    // grant approval and resume; the gated node re-runs and re-checks
    restored
        .context()
        .lock()
        .await
        .set("approval", serde_json::json!(true));
    let answer = restored.resume().await.unwrap();

    assert_eq!(answer, "published");
    let trace = restored.trace().await;
    assert_eq!(member_sources(&trace), vec!["drafter", "publisher"]);
    assert!(!restored.is_suspended().await);
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn test_sessions_never_observe_each_other() {
    let build = || {
        CoordinationSession::builder()
            .protocol(Arc::new(SequentialProtocol))
            .member(ScriptedMember::new("solo", "works alone", &["done"]))
            .build()
            .unwrap()
    };

    let one = build();
    let two = build();

    one.context()
        .lock()
        .await
        .set("tenant", serde_json::json!("acme"));
    two.context()
        .lock()
        .await
        .set("tenant", serde_json::json!("globex"));

    one.run("task one").await.unwrap();
    two.run("task two").await.unwrap();

    assert_eq!(
        one.context().lock().await.get("tenant"),
        Some(&serde_json::json!("acme"))
    );
    assert_eq!(
        two.context().lock().await.get("tenant"),
        Some(&serde_json::json!("globex"))
    );
}
