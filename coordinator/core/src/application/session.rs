// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Coordination Session Application Service
//!
//! The session is the caller-facing entry point: it binds a protocol, a
//! member roster, an optional oracle, and the interceptor chain into one
//! configured unit, then drives the execution engine over the protocol's
//! graph.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** run / resume / snapshot entry points, event publication
//!
//! Each session owns one [`ExecutionContext`]; contexts are never shared
//! across sessions and no value written in one session is observable from
//! another.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::engine::{EngineConfig, ExecutionEngine, RunOutcome};
use crate::domain::context::{ExecutionContext, SessionId, SharedContext, TASK_KEY};
use crate::domain::events::CoordinationEvent;
use crate::domain::graph::GraphModel;
use crate::domain::interceptor::{Interceptor, InterceptorChain};
use crate::domain::member::{MemberAgent, MemberRoster};
use crate::domain::oracle::DecisionOracle;
use crate::domain::protocol::{
    CoordinationConfig, CoordinationProtocol, ProtocolAssembly, RunOverrides,
};
use crate::domain::repository::SnapshotRepository;
use crate::domain::trace::CollaborationTrace;
use crate::infrastructure::event_bus::EventBus;

/// One configured coordination session.
pub struct CoordinationSession {
    id: SessionId,
    protocol: Arc<dyn CoordinationProtocol>,
    roster: Arc<MemberRoster>,
    oracle: Option<Arc<dyn DecisionOracle>>,
    graph: Arc<GraphModel>,
    context: SharedContext,
    interceptors: Arc<InterceptorChain>,
    event_bus: Arc<EventBus>,
    config: CoordinationConfig,
}

impl CoordinationSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn protocol_name(&self) -> &'static str {
        self.protocol.name()
    }

    /// The session's shared context, for tests and embedding hosts.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Read-only copy of the collaboration trace.
    pub async fn trace(&self) -> CollaborationTrace {
        self.context.lock().await.trace().clone()
    }

    pub async fn is_suspended(&self) -> bool {
        self.context.lock().await.is_stopped()
    }

    // ========================================================================
    // Entry Points
    // ========================================================================

    /// Start a new task from a user prompt and run it to completion,
    /// suspension, or budget exhaustion.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        self.run_with(prompt, RunOverrides::default()).await
    }

    /// Like [`run`](Self::run) with a per-run override overlay on the
    /// immutable session configuration.
    ///
    /// Overridden budgets reach the protocol's decision nodes too: a
    /// non-empty overlay rebuilds the graph for this run. The base
    /// configuration (and graph) stay untouched.
    pub async fn run_with(&self, prompt: &str, overrides: RunOverrides) -> Result<String> {
        let config = self.config.with_overrides(&overrides);
        let graph = if overrides.is_empty() {
            self.graph.clone()
        } else {
            let assembly = ProtocolAssembly {
                roster: self.roster.clone(),
                oracle: self.oracle.clone(),
                interceptors: self.interceptors.clone(),
                config: config.clone(),
            };
            Arc::new(
                self.protocol
                    .build_graph(&assembly)
                    .context("failed to rebuild protocol graph for run overrides")?,
            )
        };

        {
            let mut guard = self.context.lock().await;
            guard.trace_mut().begin_task();
            guard.set(TASK_KEY, serde_json::json!(prompt));
            guard.clear_stop();
        }

        info!(
            session_id = %self.id,
            protocol = self.protocol.name(),
            "starting coordination run"
        );
        self.event_bus.publish(CoordinationEvent::RunStarted {
            session_id: self.id,
            protocol: self.protocol.name().to_string(),
            started_at: Utc::now(),
        });

        self.interceptors
            .run_start(&self.context)
            .await
            .context("run-start interceptor aborted the run")?;

        let outcome = self.drive(graph, None, &config).await?;
        self.finish(outcome).await
    }

    /// Continue a suspended run from the snapshot's last node. No new
    /// prompt: the trace and context carry the task. The suspended node
    /// re-executes and must re-check its own unblocking condition.
    pub async fn resume(&self) -> Result<String> {
        let hint = {
            let guard = self.context.lock().await;
            guard.last_node_id().map(str::to_string)
        };
        let hint = hint.context("nothing to resume: no prior run recorded")?;

        info!(session_id = %self.id, node = %hint, "resuming coordination run");
        let config = self.config.clone();
        let outcome = self.drive(self.graph.clone(), Some(hint), &config).await?;
        self.finish(outcome).await
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Serialize the session's context (entries, trace, last node, stop
    /// flag) into an opaque blob.
    pub async fn snapshot(&self) -> Result<String> {
        self.context
            .lock()
            .await
            .to_snapshot()
            .context("failed to snapshot session context")
    }

    /// Replace the session's context with a restored snapshot.
    pub async fn restore_snapshot(&self, blob: &str) -> Result<()> {
        let restored =
            ExecutionContext::from_snapshot(blob).context("failed to restore session snapshot")?;
        *self.context.lock().await = restored;
        Ok(())
    }

    pub async fn persist_snapshot(&self, repository: &dyn SnapshotRepository) -> Result<()> {
        let blob = self.snapshot().await?;
        repository.save(self.id, blob).await
    }

    /// Returns false when the repository holds no snapshot for this
    /// session.
    pub async fn restore_from_repository(
        &self,
        repository: &dyn SnapshotRepository,
    ) -> Result<bool> {
        match repository.load(self.id).await? {
            Some(blob) => {
                self.restore_snapshot(&blob).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // Drive & Finish
    // ========================================================================

    async fn drive(
        &self,
        graph: Arc<GraphModel>,
        start_hint: Option<String>,
        config: &CoordinationConfig,
    ) -> Result<RunOutcome> {
        let engine = ExecutionEngine::new(EngineConfig {
            max_steps: config.max_steps,
        });
        match engine
            .run(graph, start_hint.as_deref(), &self.context)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let node = {
                    let guard = self.context.lock().await;
                    guard.last_node_id().map(str::to_string)
                };
                self.event_bus.publish(CoordinationEvent::RunFailed {
                    session_id: self.id,
                    node,
                    reason: err.to_string(),
                    failed_at: Utc::now(),
                });
                Err(anyhow::Error::new(err).context("coordination run aborted"))
            }
        }
    }

    async fn finish(&self, outcome: RunOutcome) -> Result<String> {
        match outcome {
            RunOutcome::Suspended => {
                let (node, answer) = {
                    let guard = self.context.lock().await;
                    (
                        guard.last_node_id().map(str::to_string),
                        partial_answer(guard.trace()),
                    )
                };
                self.event_bus.publish(CoordinationEvent::RunSuspended {
                    session_id: self.id,
                    node,
                    suspended_at: Utc::now(),
                });
                Ok(answer)
            }
            RunOutcome::Completed(answer) => {
                self.conclude().await?;
                let answer = match answer {
                    Some(answer) => answer,
                    None => partial_answer(self.context.lock().await.trace()),
                };
                self.event_bus.publish(CoordinationEvent::RunCompleted {
                    session_id: self.id,
                    answer: Some(answer.clone()),
                    completed_at: Utc::now(),
                });
                Ok(answer)
            }
            RunOutcome::BudgetExhausted => {
                // Defined terminal transition: return whatever partial
                // answer the trace holds.
                debug!(session_id = %self.id, "run ended by budget exhaustion");
                self.conclude().await?;
                let answer = partial_answer(self.context.lock().await.trace());
                self.event_bus.publish(CoordinationEvent::RunCompleted {
                    session_id: self.id,
                    answer: Some(answer.clone()),
                    completed_at: Utc::now(),
                });
                Ok(answer)
            }
        }
    }

    async fn conclude(&self) -> Result<()> {
        {
            let mut guard = self.context.lock().await;
            self.protocol.on_run_end(&mut guard);
        }
        self.interceptors
            .run_end(&self.context)
            .await
            .context("run-end interceptor aborted the run")?;
        Ok(())
    }
}

fn partial_answer(trace: &CollaborationTrace) -> String {
    trace
        .final_answer
        .clone()
        .or_else(|| trace.last_member_content().map(str::to_string))
        .unwrap_or_default()
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`CoordinationSession`].
#[derive(Default)]
pub struct SessionBuilder {
    protocol: Option<Arc<dyn CoordinationProtocol>>,
    members: Vec<Arc<dyn MemberAgent>>,
    oracle: Option<Arc<dyn DecisionOracle>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    config: Option<CoordinationConfig>,
    event_bus: Option<Arc<EventBus>>,
}

impl SessionBuilder {
    pub fn protocol(mut self, protocol: Arc<dyn CoordinationProtocol>) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn member(mut self, member: Arc<dyn MemberAgent>) -> Self {
        self.members.push(member);
        self
    }

    pub fn members(mut self, members: impl IntoIterator<Item = Arc<dyn MemberAgent>>) -> Self {
        self.members.extend(members);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn DecisionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn config(mut self, config: CoordinationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<CoordinationSession> {
        let protocol = self.protocol.context("coordination protocol is required")?;
        let roster = Arc::new(
            MemberRoster::from_members(self.members).context("invalid member roster")?,
        );
        let interceptors = Arc::new(InterceptorChain::new(self.interceptors));
        let config = self.config.unwrap_or_default();

        let assembly = ProtocolAssembly {
            roster: roster.clone(),
            oracle: self.oracle.clone(),
            interceptors: interceptors.clone(),
            config: config.clone(),
        };
        let graph = Arc::new(
            protocol
                .build_graph(&assembly)
                .context("failed to build protocol graph")?,
        );

        Ok(CoordinationSession {
            id: SessionId::new(),
            protocol,
            roster,
            oracle: self.oracle,
            graph,
            context: ExecutionContext::new().shared(),
            interceptors,
            event_bus: self
                .event_bus
                .unwrap_or_else(|| Arc::new(EventBus::with_default_capacity())),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{
        GraphBuilder, GraphError, NodeTask, TaskError, END_NODE, START_NODE,
    };
    use crate::domain::member::MemberError;
    use crate::domain::trace::{Route, StepRole};
    use async_trait::async_trait;

    struct AnswerTask;

    #[async_trait]
    impl NodeTask for AnswerTask {
        async fn run(&self, ctx: &SharedContext) -> Result<(), TaskError> {
            let mut guard = ctx.lock().await;
            let task = guard.get_str(TASK_KEY).unwrap_or_default().to_string();
            guard
                .trace_mut()
                .add_step("solo", StepRole::Member, format!("answer to: {}", task), 1);
            guard.trace_mut().final_answer = Some(format!("answer to: {}", task));
            guard.trace_mut().route = Route::Terminal;
            Ok(())
        }
    }

    /// Minimal single-activity protocol used to exercise the session.
    struct SoloProtocol;

    impl CoordinationProtocol for SoloProtocol {
        fn name(&self) -> &'static str {
            "solo"
        }

        fn build_graph(&self, _assembly: &ProtocolAssembly) -> Result<GraphModel, GraphError> {
            GraphBuilder::new()
                .add_start()
                .add_activity("solo", Arc::new(AnswerTask))
                .add_end()
                .edge(START_NODE, "solo")
                .edge("solo", END_NODE)
                .build()
        }
    }

    struct StubMember;

    #[async_trait]
    impl MemberAgent for StubMember {
        fn name(&self) -> &str {
            "solo"
        }

        fn description(&self) -> &str {
            "does everything"
        }

        async fn ask(&self, _ctx: &SharedContext, _prompt: &str) -> Result<String, MemberError> {
            Ok("ok".to_string())
        }
    }

    fn session() -> CoordinationSession {
        CoordinationSession::builder()
            .protocol(Arc::new(SoloProtocol))
            .member(Arc::new(StubMember))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_returns_final_answer() {
        let session = session();
        let answer = session.run("count the monkeys").await.unwrap();
        assert_eq!(answer, "answer to: count the monkeys");
    }

    #[tokio::test]
    async fn test_run_publishes_lifecycle_events() {
        let bus = Arc::new(EventBus::with_default_capacity());
        let session = CoordinationSession::builder()
            .protocol(Arc::new(SoloProtocol))
            .member(Arc::new(StubMember))
            .event_bus(bus.clone())
            .build()
            .unwrap();

        let mut receiver = bus.subscribe();
        session.run("task").await.unwrap();

        let first = receiver.recv().await.unwrap();
        assert!(matches!(first, CoordinationEvent::RunStarted { .. }));
        let second = receiver.recv().await.unwrap();
        assert!(matches!(second, CoordinationEvent::RunCompleted { .. }));
    }

    #[tokio::test]
    async fn test_new_prompt_resets_trace() {
        let session = session();
        session.run("first").await.unwrap();
        session.run("second").await.unwrap();

        let trace = session.trace().await;
        assert_eq!(trace.record_count(), 1);
        assert_eq!(trace.final_answer.as_deref(), Some("answer to: second"));
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let session = session();
        session.run("persisted task").await.unwrap();

        let blob = session.snapshot().await.unwrap();
        let other = self::session();
        other.restore_snapshot(&blob).await.unwrap();

        let trace = other.trace().await;
        assert_eq!(trace.record_count(), 1);
        assert_eq!(
            trace.final_answer.as_deref(),
            Some("answer to: persisted task")
        );
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let one = session();
        let two = session();

        one.run("alpha").await.unwrap();
        two.run("beta").await.unwrap();

        assert_eq!(
            one.trace().await.final_answer.as_deref(),
            Some("answer to: alpha")
        );
        assert_eq!(
            two.trace().await.final_answer.as_deref(),
            Some("answer to: beta")
        );
    }

    #[tokio::test]
    async fn test_builder_requires_protocol() {
        let result = CoordinationSession::builder()
            .member(Arc::new(StubMember))
            .build();
        assert!(result.is_err());
    }
}
