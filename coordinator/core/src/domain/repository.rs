// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Snapshot Repository
//!
//! Persistence port for session snapshots.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Snapshot persistence contract

use async_trait::async_trait;

use crate::domain::context::SessionId;

/// Persistence port for opaque snapshot blobs, keyed by session.
///
/// Implementations in infrastructure/repositories.rs.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn save(&self, session_id: SessionId, blob: String) -> anyhow::Result<()>;

    async fn load(&self, session_id: SessionId) -> anyhow::Result<Option<String>>;

    async fn delete(&self, session_id: SessionId) -> anyhow::Result<()>;
}
