// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use ck_core::{ActionStatus, Method};
use tempfile::TempDir;
use yare::parameterized;

const TTL: Duration = Duration::from_secs(300);

fn note(n: usize) -> NewAction {
    NewAction::new(Method::Post, format!("/api/patients/{n}/notes"))
        .header("Content-Type", "application/json")
        .body(format!("{{\"text\":\"note {n}\"}}"))
}

#[parameterized(
    none = { 0 },
    one = { 1 },
    several = { 7 },
)]
fn count_tracks_unresolved_entries(n: usize) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let queue = WriteQueue::open_in_memory(TTL).unwrap();
        for i in 0..n {
            queue.enqueue(note(i)).await.unwrap();
        }
        assert_eq!(queue.count().await.unwrap(), n as u64);

        let batch = queue.dequeue_batch().await.unwrap();
        assert_eq!(queue.count().await.unwrap(), n as u64);
        if let Some(first) = batch.first() {
            queue.mark_synced(&first.id).await.unwrap();
            assert_eq!(queue.count().await.unwrap(), n as u64 - 1);
        }
    });
}

#[tokio::test]
async fn enqueue_persists_before_returning() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");
    let queue = WriteQueue::open(&path, TTL).unwrap();
    let action = queue.enqueue(note(1)).await.unwrap();

    let other = WriteQueue::open(&path, TTL).unwrap();
    let listed = other.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, action.id);
    assert_eq!(listed[0].status, ActionStatus::Pending);
}

#[tokio::test]
async fn batch_is_fifo_and_claimed() {
    let queue = WriteQueue::open_in_memory(TTL).unwrap();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(queue.enqueue(note(i)).await.unwrap().id);
    }

    let batch = queue.dequeue_batch().await.unwrap();
    assert_eq!(batch.iter().map(|a| a.id.clone()).collect::<Vec<_>>(), ids);
    assert!(batch.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(batch.iter().all(|a| a.status == ActionStatus::InFlight));

    // Claimed entries are not handed out twice.
    assert!(queue.dequeue_batch().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_entries_return_in_the_next_batch() {
    let queue = WriteQueue::open_in_memory(TTL).unwrap();
    let a = queue.enqueue(note(1)).await.unwrap();
    let b = queue.enqueue(note(2)).await.unwrap();

    queue.dequeue_batch().await.unwrap();
    queue.mark_failed(&a.id, "HTTP 500").await.unwrap();
    queue.mark_synced(&b.id).await.unwrap();

    let listed = queue.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ActionStatus::Failed);
    assert_eq!(listed[0].attempts, 1);
    assert_eq!(listed[0].last_error.as_deref(), Some("HTTP 500"));

    let retry = queue.dequeue_batch().await.unwrap();
    assert_eq!(retry.len(), 1);
    assert_eq!(retry[0].id, a.id);
}

#[tokio::test]
async fn release_returns_claims_to_pending() {
    let queue = WriteQueue::open_in_memory(TTL).unwrap();
    queue.enqueue(note(1)).await.unwrap();
    queue.enqueue(note(2)).await.unwrap();

    let batch = queue.dequeue_batch().await.unwrap();
    let released = queue
        .release(batch.iter().map(|a| a.id.clone()).collect())
        .await
        .unwrap();
    assert_eq!(released, 2);
    assert_eq!(queue.release(Vec::new()).await.unwrap(), 0);
    assert_eq!(queue.dequeue_batch().await.unwrap().len(), 2);
}

#[tokio::test]
async fn shared_store_never_double_claims() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");
    let first = WriteQueue::open(&path, TTL).unwrap();
    let second = WriteQueue::open(&path, TTL).unwrap();
    for i in 0..10 {
        first.enqueue(note(i)).await.unwrap();
    }

    let (a, b) = tokio::join!(first.dequeue_batch(), second.dequeue_batch());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.len() + b.len(), 10);
    assert!(a.iter().all(|x| b.iter().all(|y| x.id != y.id)));
}

#[tokio::test]
async fn invalid_action_is_rejected() {
    let queue = WriteQueue::open_in_memory(TTL).unwrap();
    let result = queue.enqueue(NewAction::new(Method::Post, "")).await;
    assert!(matches!(result, Err(crate::error::Error::InvalidInput(_))));
    assert_eq!(queue.count().await.unwrap(), 0);
}

#[tokio::test]
async fn marking_unknown_action_is_not_found() {
    let queue = WriteQueue::open_in_memory(TTL).unwrap();
    let result = queue.mark_synced("0000000000000-deadbeef").await;
    assert!(matches!(result, Err(crate::error::Error::ActionNotFound(_))));
}

#[tokio::test]
async fn count_by_status_tracks_claims() {
    let queue = WriteQueue::open_in_memory(TTL).unwrap();
    for n in 0..3 {
        queue.enqueue(note(n)).await.unwrap();
    }
    assert_eq!(queue.count_by_status(ActionStatus::InFlight).await.unwrap(), 0);

    let batch = queue.dequeue_batch().await.unwrap();
    queue.mark_failed(&batch[0].id, "HTTP 500").await.unwrap();
    assert_eq!(queue.count_by_status(ActionStatus::InFlight).await.unwrap(), 2);
    assert_eq!(queue.count_by_status(ActionStatus::Failed).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_enqueue_transaction_reaches_caller() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");
    let queue = WriteQueue::open(&path, TTL).unwrap();
    crate::test_helpers::break_store(&path);

    let result = queue.enqueue(note(1)).await;
    assert!(matches!(result, Err(crate::error::Error::StoreTransactionFailed(_))));
}
