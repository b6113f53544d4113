// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Repository Implementations
//
// Snapshot persistence for development and tests. Durable backends
// implement the same domain port.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::context::SessionId;
use crate::domain::repository::SnapshotRepository;

/// In-memory snapshot store keyed by session.
#[derive(Default)]
pub struct InMemorySnapshotRepository {
    blobs: RwLock<HashMap<SessionId, String>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn save(&self, session_id: SessionId, blob: String) -> anyhow::Result<()> {
        self.blobs.write().await.insert(session_id, blob);
        Ok(())
    }

    async fn load(&self, session_id: SessionId) -> anyhow::Result<Option<String>> {
        Ok(self.blobs.read().await.get(&session_id).cloned())
    }

    async fn delete(&self, session_id: SessionId) -> anyhow::Result<()> {
        self.blobs.write().await.remove(&session_id);
        Ok(())
    }
}
