// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration management.
//!
//! Configuration is stored in `carekeep.toml` inside the state directory.
//! Every field has a default, so a missing file or a partial file is valid.
//! The state directory is `CAREKEEP_STATE_DIR`, else
//! `$XDG_STATE_HOME/carekeep`, else `~/.local/state/carekeep`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env;
use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "carekeep.toml";
const STORE_FILE_NAME: &str = "queue.db";
const AGENT_DIR_NAME: &str = "agent";
const STATE_DIR_NAME: &str = "carekeep";

/// Lower bound for the agent update-check timer.
pub const MIN_UPDATE_CHECK_SECS: u64 = 60;

/// Top-level configuration stored in `carekeep.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Directory the config was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub state_dir: PathBuf,
}

/// Local action store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Path to the queue database (default: `<state>/queue.db`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Background agent settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Agent directory holding its socket, PID, lock and log (default: `<state>/agent`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Path to the `carekeepd` binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    /// Launch an agent on registration when none is running (default: true).
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// Upper bound on a single bridge call in milliseconds (default: 2000).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Update-check interval in seconds, never below 60 (default: 60).
    #[serde(default = "default_update_check_secs")]
    pub update_check_secs: u64,
}

/// Sync session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Whole-session deadline in milliseconds (default: 5000).
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Age after which an in-flight claim is considered abandoned (default: 300).
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
    /// Ask a replay-capable agent to register its own durable replay (default: false).
    #[serde(default)]
    pub delegate_to_agent: bool,
    /// Start a session on connectivity restoration and resume (default: true).
    #[serde(default = "default_true")]
    pub auto_sync: bool,
}

/// Reachability probing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectivityConfig {
    /// `host:port` probed over TCP; no watcher runs when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_addr: Option<String>,
    /// Seconds between probes (default: 15).
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Connect timeout per probe in milliseconds (default: 2000).
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

/// Network replay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayConfig {
    /// Base URL joined to relative action URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_call_timeout_ms() -> u64 {
    2000
}

fn default_update_check_secs() -> u64 {
    MIN_UPDATE_CHECK_SECS
}

fn default_deadline_ms() -> u64 {
    5000
}

fn default_claim_ttl_secs() -> u64 {
    300
}

fn default_probe_interval_secs() -> u64 {
    15
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            dir: None,
            binary: None,
            autostart: true,
            call_timeout_ms: default_call_timeout_ms(),
            update_check_secs: default_update_check_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            deadline_ms: default_deadline_ms(),
            claim_ttl_secs: default_claim_ttl_secs(),
            delegate_to_agent: false,
            auto_sync: true,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        ConnectivityConfig {
            probe_addr: None,
            probe_interval_secs: default_probe_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `state_dir`.
    pub fn for_state_dir(state_dir: &Path) -> Self {
        Config {
            state_dir: state_dir.to_path_buf(),
            ..Config::default()
        }
    }

    /// Load `carekeep.toml` from the state directory, or defaults if absent.
    pub fn load(state_dir: &Path) -> Result<Self> {
        Self::load_file(&state_dir.join(CONFIG_FILE_NAME), state_dir)
    }

    /// Load the configuration the environment points at.
    ///
    /// `CAREKEEP_CONFIG` names a file directly; otherwise the state directory is used.
    pub fn load_default() -> Result<Self> {
        let state_dir = resolve_state_dir();
        match env::config_path() {
            Some(path) => Self::load_file(&path, &state_dir),
            None => Self::load(&state_dir),
        }
    }

    fn load_file(path: &Path, state_dir: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            Config::default()
        };
        config.state_dir = state_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `carekeep.toml` in the state directory.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.state_dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(self.state_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.sync.deadline_ms == 0 {
            return Err(Error::Config("sync.deadline_ms must be positive".into()));
        }
        if self.agent.call_timeout_ms == 0 {
            return Err(Error::Config("agent.call_timeout_ms must be positive".into()));
        }
        if self.connectivity.probe_interval_secs == 0 {
            return Err(Error::Config(
                "connectivity.probe_interval_secs must be positive".into(),
            ));
        }
        if let Some(base) = &self.replay.base_url {
            if reqwest::Url::parse(base).is_err() {
                return Err(Error::Config(format!("replay.base_url is not a URL: '{base}'")));
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.state_dir.join(path)
        }
    }

    /// Path of the action queue database.
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(p) => self.resolve(p),
            None => self.state_dir.join(STORE_FILE_NAME),
        }
    }

    /// Directory of the background agent.
    pub fn agent_dir(&self) -> PathBuf {
        match &self.agent.dir {
            Some(p) => self.resolve(p),
            None => self.state_dir.join(AGENT_DIR_NAME),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.agent.call_timeout_ms)
    }

    /// Update-check interval, clamped to at least a minute.
    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.agent.update_check_secs.max(MIN_UPDATE_CHECK_SECS))
    }

    pub fn sync_deadline(&self) -> Duration {
        Duration::from_millis(self.sync.deadline_ms)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.sync.claim_ttl_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.replay.request_timeout_secs)
    }
}

/// Resolve the state directory from the environment.
pub fn resolve_state_dir() -> PathBuf {
    state_dir_from(env::state_dir(), env::xdg_state_home(), dirs::home_dir())
}

/// State directory precedence: explicit override, XDG state home, home directory.
pub fn state_dir_from(
    explicit: Option<PathBuf>,
    xdg_state_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = xdg_state_home {
        return dir.join(STATE_DIR_NAME);
    }
    home.map(|h| h.join(".local/state").join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".local/state").join(STATE_DIR_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
