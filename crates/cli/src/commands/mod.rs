// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod agent;
pub mod cache;
pub mod queue;
pub mod status;

use std::str::FromStr;

use ck_ipc::EntityType;

use crate::config::Config;
use crate::connectivity::{ReachabilityProbe, TcpProbe};
use crate::error::{Error, Result};
use crate::facade::OfflineFacade;

/// Open the facade for a one-shot command.
///
/// Auto-sync is off: a command only replays when asked to.
pub async fn open_facade(config: &Config) -> Result<OfflineFacade> {
    let mut config = config.clone();
    config.sync.auto_sync = false;
    config.connectivity.probe_addr = None;
    OfflineFacade::open(&config).await
}

/// Probe the configured backend once. `None` when no probe address is set.
pub async fn probe_once(config: &Config) -> Option<bool> {
    let addr = config.connectivity.probe_addr.as_ref()?;
    Some(
        TcpProbe::new(addr.clone(), config.probe_timeout())
            .probe()
            .await,
    )
}

/// Parse an entity type argument.
pub fn parse_entity_type(s: &str) -> Result<EntityType> {
    Ok(EntityType::from_str(s)?)
}

/// Parse a `Name: value` header argument.
pub fn parse_header(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| Error::InvalidInput(format!("header '{s}' must look like 'Name: value'")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(format!("header '{s}' has no name")));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
