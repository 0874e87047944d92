// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `CAREKEEP_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    non_empty(vars::CAREKEEP_STATE_DIR).map(PathBuf::from)
}

/// Returns the value of `CAREKEEP_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    non_empty(vars::CAREKEEP_CONFIG).map(PathBuf::from)
}

/// Returns the value of `CAREKEEP_AGENT_BINARY` if set.
pub fn agent_binary() -> Option<PathBuf> {
    non_empty(vars::CAREKEEP_AGENT_BINARY).map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    non_empty(vars::XDG_STATE_HOME).map(PathBuf::from)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
