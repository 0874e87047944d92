// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replay of queued actions against the backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ SyncCoordinator │────►│  Replayer   │────►│   Backend   │
//! │  (state machine)│     │   (trait)   │     │    (HTTP)   │
//! └─────────────────┘     └─────────────┘     └─────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   WriteQueue    │  (durable, FIFO)
//! └─────────────────┘
//! ```
//!
//! - One session at a time, bounded by a deadline
//! - Cooperative cancellation between replays
//! - Failed actions stay queued for the next session
//! - Injectable replayer for testing

mod coordinator;
mod replay;

pub use coordinator::{
    CoordinatorConfig, SessionHandle, SyncCoordinator, SyncOutcome, SyncReport, SyncStart,
    SyncState, SyncTrigger, SYNC_TAG,
};
pub use replay::{HttpReplayer, ReplayFuture, Replayer, IDEMPOTENCY_HEADER};
