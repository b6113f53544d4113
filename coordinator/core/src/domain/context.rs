// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Execution Context — Domain Model
//!
//! The shared mutable key/value store for one coordination run, together
//! with the last-node pointer and the cooperative stop flag. One context
//! exists per session; contexts are never shared across sessions.
//!
//! The context serializes to and from an opaque snapshot blob. The round
//! trip preserves every entry, the full trace (dashboard included), the
//! last-node pointer, and the stop flag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::trace::CollaborationTrace;

/// Context key under which the current task text is stored.
pub const TASK_KEY: &str = "task";

/// Context key holding the most recent member output.
pub const LAST_OUTPUT_KEY: &str = "last_output";

/// Unique identifier for a coordination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the context is threaded through node tasks and hooks.
///
/// Tasks lock briefly to read or mutate state and must not hold the lock
/// across member or oracle calls.
pub type SharedContext = Arc<Mutex<ExecutionContext>>;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),

    #[error("failed to decode snapshot: {0}")]
    Decode(String),
}

/// Shared mutable state for one coordination run.
///
/// Created per session at first run, mutated by every node task and every
/// interceptor, persisted via snapshot, destroyed only when the caller
/// discards the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    entries: BTreeMap<String, serde_json::Value>,
    trace: CollaborationTrace,
    last_node_id: Option<String>,
    stopped: bool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the context for threading through tasks.
    pub fn shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    // ========================================================================
    // Key/Value Entries
    // ========================================================================

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    /// String view of an entry, for text-valued keys like the task prompt.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.entries
    }

    // ========================================================================
    // Trace
    // ========================================================================

    pub fn trace(&self) -> &CollaborationTrace {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut CollaborationTrace {
        &mut self.trace
    }

    // ========================================================================
    // Last Node & Stop Flag
    // ========================================================================

    pub fn last_node_id(&self) -> Option<&str> {
        self.last_node_id.as_deref()
    }

    pub fn set_last_node(&mut self, node_id: impl Into<String>) {
        self.last_node_id = Some(node_id.into());
    }

    /// Request cooperative suspension of the run. The engine observes the
    /// flag after the current node finishes; nothing in flight is preempted.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn clear_stop(&mut self) {
        self.stopped = false;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    // ========================================================================
    // Snapshot Round Trip
    // ========================================================================

    /// Serialize the full context to an opaque snapshot blob.
    pub fn to_snapshot(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Restore a context from a snapshot blob.
    pub fn from_snapshot(blob: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(blob).map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}
