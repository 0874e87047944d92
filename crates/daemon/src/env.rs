// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the agent.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

/// Returns the value of `CAREKEEP_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(names::CAREKEEP_STATE_DIR)
        .ok()
        .map(PathBuf::from)
}

/// Returns the value of `CAREKEEP_SNAPSHOT_DB` if set.
pub fn snapshot_db() -> Option<PathBuf> {
    std::env::var(names::CAREKEEP_SNAPSHOT_DB)
        .ok()
        .map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(names::XDG_STATE_HOME).ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
