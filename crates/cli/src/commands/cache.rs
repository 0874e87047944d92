// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot cache commands.

use std::fs;
use std::path::Path;

use ck_ipc::{CacheCounts, EntityBundle};
use serde_json::{json, Value};

use super::{open_facade, parse_entity_type};
use crate::cache::{CacheOutcome, CacheStatus, FallbackRead};
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::{Error, Result};

const UNAVAILABLE: &str = "Background agent unavailable; no cached data.";

pub async fn status(config: &Config, output: OutputFormat) -> Result<()> {
    let facade = open_facade(config).await?;
    let status = facade.cache_status().await?;

    match (output, status) {
        (OutputFormat::Text, CacheStatus::Unavailable) => println!("{UNAVAILABLE}"),
        (OutputFormat::Text, CacheStatus::Available(counts)) => {
            for line in format_counts(&counts) {
                println!("{line}");
            }
        }
        (OutputFormat::Json, CacheStatus::Unavailable) => {
            println!("{}", json!({ "available": false }))
        }
        (OutputFormat::Json, CacheStatus::Available(counts)) => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "available": true, "counts": counts }))?
        ),
    }
    Ok(())
}

pub(crate) fn format_counts(counts: &CacheCounts) -> Vec<String> {
    if counts.is_empty() {
        return vec!["Cache is empty.".to_string()];
    }
    counts
        .iter()
        .map(|(entity_type, n)| format!("{:<14} {}", entity_type.as_str(), n))
        .collect()
}

pub async fn clear(config: &Config) -> Result<()> {
    let facade = open_facade(config).await?;
    if facade.clear_cache().await? {
        println!("Cache cleared.");
    } else {
        println!("{UNAVAILABLE}");
    }
    Ok(())
}

/// Print the cached snapshot for one entity type as JSON.
pub async fn read(config: &Config, entity_type: &str) -> Result<()> {
    let entity_type = parse_entity_type(entity_type)?;
    let facade = open_facade(config).await?;

    match facade.fallback_read(entity_type).await? {
        FallbackRead::Stale(snapshot) => {
            eprintln!(
                "stale: cached {} ({} min ago)",
                snapshot.cached_at.to_rfc3339(),
                snapshot.age_minutes()
            );
            println!("{}", serde_json::to_string_pretty(&snapshot.records)?);
        }
        FallbackRead::Missing => println!("No cached {entity_type}."),
        FallbackRead::Unavailable => println!("{UNAVAILABLE}"),
    }
    Ok(())
}

/// Replace the cached snapshot of one entity type with the records in `file`.
pub async fn write(config: &Config, entity_type: &str, file: &Path) -> Result<()> {
    let entity_type = parse_entity_type(entity_type)?;
    let records = read_records(file)?;
    let facade = open_facade(config).await?;

    let count = records.len();
    let bundle = EntityBundle::new().with(entity_type, records);
    match facade.cache_medical_data(bundle).await? {
        CacheOutcome::Cached { .. } => println!("Cached {count} {entity_type}."),
        CacheOutcome::NotCached => println!("{UNAVAILABLE}"),
    }
    Ok(())
}

pub(crate) fn read_records(file: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(file)?;
    match serde_json::from_str(&content)? {
        Value::Array(records) => Ok(records),
        _ => Err(Error::InvalidInput(format!(
            "{} must contain a JSON array of records",
            file.display()
        ))),
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
