// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Governance Interceptors — Domain Model
//!
//! Ordered hooks fired around the run, the decision step, and each member
//! execution. Before-hooks can veto; any hook may call the context's
//! `stop()` primitive to suspend the run mid-graph (human-in-the-loop
//! gates).
//!
//! Hook errors are not caught by the chain: they propagate and abort the
//! run exactly like a task error.

use async_trait::async_trait;

use crate::domain::context::SharedContext;
use crate::domain::graph::TaskError;

/// Outcome of a before-hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDecision {
    Proceed,
    /// Veto the guarded action: a vetoed decision call forces the terminal
    /// route; a vetoed member is skipped and control returns to routing.
    Veto,
}

/// One governance hook. All extension points default to no-ops so an
/// interceptor implements only the points it cares about.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Chain position; lower ranks fire first.
    fn rank(&self) -> i32 {
        0
    }

    async fn on_run_start(&self, _ctx: &SharedContext) -> Result<(), TaskError> {
        Ok(())
    }

    async fn before_decision(&self, _ctx: &SharedContext) -> Result<InterceptDecision, TaskError> {
        Ok(InterceptDecision::Proceed)
    }

    async fn after_decision(&self, _ctx: &SharedContext) -> Result<(), TaskError> {
        Ok(())
    }

    async fn before_member(
        &self,
        _member: &str,
        _ctx: &SharedContext,
    ) -> Result<InterceptDecision, TaskError> {
        Ok(InterceptDecision::Proceed)
    }

    async fn after_member(
        &self,
        _member: &str,
        _output: &str,
        _ctx: &SharedContext,
    ) -> Result<(), TaskError> {
        Ok(())
    }

    async fn on_run_end(&self, _ctx: &SharedContext) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Rank-ordered interceptor chain. The first veto wins; later hooks are
/// not consulted for a vetoed action.
#[derive(Default)]
pub struct InterceptorChain {
    hooks: Vec<std::sync::Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new(mut hooks: Vec<std::sync::Arc<dyn Interceptor>>) -> Self {
        hooks.sort_by_key(|h| h.rank());
        Self { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub async fn run_start(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        for hook in &self.hooks {
            hook.on_run_start(ctx).await?;
        }
        Ok(())
    }

    pub async fn before_decision(&self, ctx: &SharedContext) -> Result<InterceptDecision, TaskError> {
        for hook in &self.hooks {
            if hook.before_decision(ctx).await? == InterceptDecision::Veto {
                return Ok(InterceptDecision::Veto);
            }
        }
        Ok(InterceptDecision::Proceed)
    }

    pub async fn after_decision(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        for hook in &self.hooks {
            hook.after_decision(ctx).await?;
        }
        Ok(())
    }

    pub async fn before_member(
        &self,
        member: &str,
        ctx: &SharedContext,
    ) -> Result<InterceptDecision, TaskError> {
        for hook in &self.hooks {
            if hook.before_member(member, ctx).await? == InterceptDecision::Veto {
                return Ok(InterceptDecision::Veto);
            }
        }
        Ok(InterceptDecision::Proceed)
    }

    pub async fn after_member(
        &self,
        member: &str,
        output: &str,
        ctx: &SharedContext,
    ) -> Result<(), TaskError> {
        for hook in &self.hooks {
            hook.after_member(member, output, ctx).await?;
        }
        Ok(())
    }

    pub async fn run_end(&self, ctx: &SharedContext) -> Result<(), TaskError> {
        for hook in &self.hooks {
            hook.on_run_end(ctx).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("InterceptorChain").field("hooks", &names).finish()
    }
}
