// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Action id generation.
//!
//! Ids are `{epoch millis, 13 digits}-{8 random hex chars}`. Several processes
//! may append to the same store, so the time prefix alone is not unique.

use chrono::Utc;

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate an action id for an action enqueued at `timestamp_ms`.
pub fn generate_action_id(timestamp_ms: i64) -> String {
    format!("{:013}-{:08x}", timestamp_ms, rand::random::<u32>())
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
