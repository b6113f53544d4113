// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::context::SessionId;

/// Lifecycle events published by coordination sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinationEvent {
    RunStarted {
        session_id: SessionId,
        protocol: String,
        started_at: DateTime<Utc>,
    },
    RunSuspended {
        session_id: SessionId,
        node: Option<String>,
        suspended_at: DateTime<Utc>,
    },
    RunCompleted {
        session_id: SessionId,
        answer: Option<String>,
        completed_at: DateTime<Utc>,
    },
    RunFailed {
        session_id: SessionId,
        node: Option<String>,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

impl CoordinationEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::RunStarted { session_id, .. }
            | Self::RunSuspended { session_id, .. }
            | Self::RunCompleted { session_id, .. }
            | Self::RunFailed { session_id, .. } => *session_id,
        }
    }
}
