// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background agent management commands.

use std::sync::Arc;

use ck_ipc::AgentStatus;

use crate::bridge::{lifecycle, AgentBridge};
use crate::config::Config;
use crate::error::{Error, Result};

fn client_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Show agent status.
pub fn status(config: &Config) -> Result<()> {
    match lifecycle::get_agent_status(&config.agent_dir()) {
        Ok(Some(status)) => {
            for line in format_status(&status) {
                println!("{line}");
            }
        }
        Ok(None) => println!("Status: not running"),
        Err(e) => println!("Status: error ({})", e),
    }
    Ok(())
}

pub(crate) fn format_status(status: &AgentStatus) -> Vec<String> {
    let mut lines = vec![
        "Status: running".to_string(),
        format!("PID: {}", status.info.pid),
        format!("Version: {}", status.info.version),
        format!("Uptime: {}s", status.uptime_secs),
    ];
    if !status.info.capabilities.is_empty() {
        lines.push(format!(
            "Capabilities: {}",
            status.info.capabilities.join(", ")
        ));
    }
    if status.info.version != client_version() {
        lines.push(format!(
            "Update available: client is {} (run 'carekeep agent update')",
            client_version()
        ));
    }
    lines
}

/// Start the agent.
pub fn start(config: &Config) -> Result<()> {
    let agent_dir = config.agent_dir();

    match lifecycle::detect_agent(&agent_dir, client_version())? {
        Some(info) => println!("Agent is already running (PID: {})", info.pid),
        None => {
            let binary = lifecycle::find_agent_binary(config.agent.binary.as_deref());
            let info = lifecycle::spawn_agent(&agent_dir, &binary, client_version())?;
            println!("Agent started (PID: {})", info.pid);
        }
    }
    Ok(())
}

/// Stop the agent.
pub fn stop(config: &Config) -> Result<()> {
    let agent_dir = config.agent_dir();

    if lifecycle::detect_agent(&agent_dir, client_version())?.is_none() {
        println!("Agent is not running.");
        return Ok(());
    }

    match lifecycle::stop_agent_forcefully(&agent_dir) {
        Ok(()) => println!("Agent stopped."),
        Err(e) => println!("Failed to stop agent: {}", e),
    }
    Ok(())
}

/// Restart the agent when its version differs from this client.
pub async fn update(config: &Config) -> Result<()> {
    let bridge = Arc::new(AgentBridge::from_config(config));
    if !bridge.register().await? {
        println!("Agent is not running.");
        return Ok(());
    }

    if bridge.apply_update().await? {
        let pid = bridge.agent_info().map(|info| info.pid).unwrap_or_default();
        println!("Agent restarted at version {} (PID: {})", client_version(), pid);
    } else {
        println!("Agent is up to date.");
    }
    Ok(())
}

/// View agent logs.
pub fn logs(config: &Config, follow: bool) -> Result<()> {
    let log_path = lifecycle::get_log_path(&config.agent_dir());

    if !log_path.exists() {
        println!("No agent logs found at {}", log_path.display());
        return Ok(());
    }

    if follow {
        let status = std::process::Command::new("tail")
            .arg("-f")
            .arg(&log_path)
            .status()?;

        if !status.success() {
            return Err(Error::Io(std::io::Error::other("tail command failed")));
        }
    } else {
        let content = std::fs::read_to_string(&log_path)?;
        print!("{}", content);
    }
    Ok(())
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
