// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ck-core: Shared library for the carekeep offline layer
//!
//! This crate provides the data model, action id generation, and the SQLite
//! stores used by both the carekeep library and the carekeepd agent.

pub mod action;
pub mod db;
pub mod entity;
pub mod error;
pub mod id;
pub mod snapshot;
pub mod store;

pub use action::{ActionStatus, Method, NewAction, PendingAction};
pub use entity::{CacheCounts, CachedEntitySet, EntityBundle, EntityType};
pub use error::{Error, Result};
pub use id::{generate_action_id, now_millis};
pub use snapshot::SnapshotStore;
pub use store::ActionStore;
