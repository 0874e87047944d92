// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Overview of the offline layer: reachability, agent, queue and cache.

use ck_core::ActionStatus;
use ck_ipc::{AgentInfo, CacheCounts};
use serde::Serialize;

use super::{open_facade, probe_once};
use crate::cache::CacheStatus;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Overview {
    /// `None` when no probe address is configured.
    pub online: Option<bool>,
    pub agent: Option<AgentInfo>,
    pub update_available: bool,
    pub pending: u64,
    /// Entries claimed by a running or interrupted session.
    pub in_flight: u64,
    /// Entries whose last replay was rejected.
    pub failed: u64,
    /// `None` when no agent is active.
    pub cache: Option<CacheCounts>,
}

pub async fn run(config: &Config, output: OutputFormat) -> Result<()> {
    let mut config = config.clone();
    config.agent.autostart = false;

    let facade = open_facade(&config).await?;
    let overview = Overview {
        online: probe_once(&config).await,
        agent: facade.bridge().agent_info(),
        update_available: facade.bridge().update_available(),
        pending: facade.pending_count().await?,
        in_flight: facade.count_by_status(ActionStatus::InFlight).await?,
        failed: facade.count_by_status(ActionStatus::Failed).await?,
        cache: match facade.cache_status().await? {
            CacheStatus::Available(counts) => Some(counts),
            CacheStatus::Unavailable => None,
        },
    };

    match output {
        OutputFormat::Text => {
            for line in format_overview(&overview) {
                println!("{line}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&overview)?),
    }
    Ok(())
}

pub(crate) fn format_overview(overview: &Overview) -> Vec<String> {
    let backend = match overview.online {
        Some(true) => "reachable",
        Some(false) => "unreachable",
        None => "unknown (no probe address configured)",
    };

    let agent = match &overview.agent {
        Some(info) if overview.update_available => {
            format!("running {} (PID {}, update available)", info.version, info.pid)
        }
        Some(info) => format!("running {} (PID {})", info.version, info.pid),
        None => "not running".to_string(),
    };

    let cache = match &overview.cache {
        Some(counts) => {
            let total: u64 = counts.values().sum();
            format!("{} records across {} entity types", total, counts.len())
        }
        None => "unavailable".to_string(),
    };

    let mut pending = overview.pending.to_string();
    if overview.in_flight > 0 || overview.failed > 0 {
        pending.push_str(&format!(
            " ({} in flight, {} failed)",
            overview.in_flight, overview.failed
        ));
    }

    vec![
        format!("Backend: {backend}"),
        format!("Agent: {agent}"),
        format!("Pending actions: {pending}"),
        format!("Cache: {cache}"),
    ]
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
