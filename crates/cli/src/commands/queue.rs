// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Write-queue commands: enqueue, pending and sync.

use std::str::FromStr;

use ck_core::{Method, NewAction, PendingAction};

use super::{open_facade, parse_header, probe_once};
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;
use crate::sync::{SyncReport, SyncStart};

/// Queue one mutating request.
pub async fn enqueue(
    config: &Config,
    method: &str,
    url: String,
    headers: Vec<String>,
    body: Option<String>,
    description: Option<String>,
    output: OutputFormat,
) -> Result<()> {
    let action = build_action(method, url, &headers, body, description)?;
    let facade = open_facade(config).await?;
    let queued = facade.enqueue_action(action).await?;

    match output {
        OutputFormat::Text => println!("Queued {} ({})", queued.id, queued.label()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&queued)?),
    }
    Ok(())
}

pub(crate) fn build_action(
    method: &str,
    url: String,
    headers: &[String],
    body: Option<String>,
    description: Option<String>,
) -> Result<NewAction> {
    let mut action = NewAction::new(Method::from_str(method)?, url);
    for header in headers {
        let (name, value) = parse_header(header)?;
        action = action.header(name, value);
    }
    if let Some(body) = body {
        action = action.body(body);
    }
    if let Some(description) = description {
        action = action.description(description);
    }
    action.validate()?;
    Ok(action)
}

/// List queued actions in replay order.
pub async fn pending(config: &Config, output: OutputFormat) -> Result<()> {
    let facade = open_facade(config).await?;
    let actions = facade.pending_actions().await?;

    match output {
        OutputFormat::Text => {
            if actions.is_empty() {
                println!("No pending actions.");
            }
            for action in &actions {
                println!("{}", format_action(action));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&actions)?),
    }
    Ok(())
}

pub(crate) fn format_action(action: &PendingAction) -> String {
    let mut line = format!("{}  {:<9}  {}", action.id, action.status.as_str(), action.label());
    if action.attempts > 0 {
        line.push_str(&format!("  [{} failed", action.attempts));
        if let Some(err) = &action.last_error {
            line.push_str(&format!(": {err}"));
        }
        line.push(']');
    }
    line
}

/// Replay queued actions now and report the session.
pub async fn sync(config: &Config, deadline_ms: Option<u64>, output: OutputFormat) -> Result<()> {
    let mut config = config.clone();
    if let Some(ms) = deadline_ms {
        config.sync.deadline_ms = ms;
    }

    let facade = open_facade(&config).await?;
    if let Some(online) = probe_once(&config).await {
        facade.set_online(online);
    }

    let report = match facade.start_sync() {
        SyncStart::Started(session) => session.wait_settled().await?,
        SyncStart::AlreadySyncing(id) => {
            println!("Sync session {id} is already running.");
            return Ok(());
        }
        SyncStart::Offline => {
            println!("Backend unreachable; {} actions remain queued.", facade.pending_count().await?);
            return Ok(());
        }
    };

    match output {
        OutputFormat::Text => println!(
            "{} ({} pending)",
            format_report(&report),
            facade.pending_count().await?
        ),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

pub(crate) fn format_report(report: &SyncReport) -> String {
    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    format!(
        "Sync {}: {} replayed, {} failed in {} ms",
        report.outcome, report.succeeded, report.failed, elapsed
    )
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
