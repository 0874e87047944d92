// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable write queue.
//!
//! Async front for [`ActionStore`]. Every operation is one store transaction
//! run on the blocking pool; `enqueue` returns only after its transaction
//! has committed.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ck_core::{ActionStatus, ActionStore, NewAction, PendingAction};

use crate::error::Result;

/// Ordered queue of deferred mutating requests.
#[derive(Clone)]
pub struct WriteQueue {
    store: Arc<Mutex<ActionStore>>,
    claim_ttl: Duration,
}

impl WriteQueue {
    pub fn new(store: ActionStore, claim_ttl: Duration) -> Self {
        WriteQueue {
            store: Arc::new(Mutex::new(store)),
            claim_ttl,
        }
    }

    pub fn open(path: &Path, claim_ttl: Duration) -> Result<Self> {
        Ok(Self::new(ActionStore::open(path)?, claim_ttl))
    }

    pub fn open_in_memory(claim_ttl: Duration) -> Result<Self> {
        Ok(Self::new(ActionStore::open_in_memory()?, claim_ttl))
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ActionStore) -> ck_core::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || {
            let mut store = store.lock().unwrap_or_else(|p| p.into_inner());
            f(&mut store)
        })
        .await?;
        Ok(result?)
    }

    /// Persist a new action and return it with its assigned id.
    pub async fn enqueue(&self, action: NewAction) -> Result<PendingAction> {
        let action = self.with_store(move |store| store.append(action)).await?;
        tracing::debug!(id = %action.id, "queued {}", action.label());
        Ok(action)
    }

    /// Claim every replayable entry, oldest first.
    pub async fn dequeue_batch(&self) -> Result<Vec<PendingAction>> {
        let ttl_ms = i64::try_from(self.claim_ttl.as_millis()).unwrap_or(i64::MAX);
        let batch = self
            .with_store(move |store| store.claim_pending(ttl_ms))
            .await?;
        if !batch.is_empty() {
            tracing::debug!("claimed {} queued actions", batch.len());
        }
        Ok(batch)
    }

    /// Remove a replayed entry.
    pub async fn mark_synced(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_store(move |store| store.delete(&id)).await
    }

    /// Record a failed replay; the entry becomes eligible for the next session.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let id = id.to_string();
        let error = error.to_string();
        self.with_store(move |store| store.mark_failed(&id, &error))
            .await
    }

    /// Return claimed but unreplayed entries to Pending.
    pub async fn release(&self, ids: Vec<String>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_store(move |store| store.release(&ids)).await
    }

    /// Number of unresolved entries.
    pub async fn count(&self) -> Result<u64> {
        self.with_store(|store| store.count()).await
    }

    /// Number of entries in one status.
    pub async fn count_by_status(&self, status: ActionStatus) -> Result<u64> {
        self.with_store(move |store| store.count_by_status(status)).await
    }

    /// All unresolved entries in FIFO order, without claiming them.
    pub async fn list(&self) -> Result<Vec<PendingAction>> {
        self.with_store(|store| store.list()).await
    }
}

impl std::fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteQueue")
            .field("claim_ttl", &self.claim_ttl)
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
