// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed snapshot store used by the background agent.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;

use crate::db::{open_connection, open_in_memory_connection, parse_db, parse_json, parse_timestamp};
use crate::entity::{CacheCounts, CachedEntitySet, EntityBundle, EntityType};
use crate::error::Result;

/// SQL schema for cached entity snapshots.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    entity_type TEXT PRIMARY KEY,
    records TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Last-known-good snapshots keyed by entity type.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open the store at the given path, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(SnapshotStore {
            conn: open_connection(path, SCHEMA)?,
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(SnapshotStore {
            conn: open_in_memory_connection(SCHEMA)?,
        })
    }

    /// Replace the snapshot of every type in `bundle`, all in one transaction.
    ///
    /// Types not named in the bundle keep their previous snapshot.
    pub fn replace(&mut self, bundle: &EntityBundle) -> Result<Vec<EntityType>> {
        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO snapshots (entity_type, records, record_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (entity_type, records) in bundle.iter() {
                let json = serde_json::to_string(records)?;
                stmt.execute(params![entity_type.as_str(), json, records.len() as i64, now])?;
            }
        }
        tx.commit()?;
        Ok(bundle.entity_types())
    }

    /// Record counts per cached type.
    pub fn counts(&self) -> Result<CacheCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT entity_type, record_count FROM snapshots")?;
        let rows = stmt.query_map([], |row| {
            let entity_type: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((parse_db::<EntityType>(&entity_type, "entity_type")?, count.max(0) as u64))
        })?;
        Ok(rows.collect::<std::result::Result<CacheCounts, _>>()?)
    }

    /// Read the snapshot for one type, if any.
    pub fn read(&self, entity_type: EntityType) -> Result<Option<CachedEntitySet>> {
        let set = self
            .conn
            .query_row(
                "SELECT records, updated_at FROM snapshots WHERE entity_type = ?1",
                params![entity_type.as_str()],
                |row| {
                    let records: String = row.get(0)?;
                    let updated_at: String = row.get(1)?;
                    Ok(CachedEntitySet {
                        entity_type,
                        records: parse_json::<Vec<Value>>(&records, "records")?,
                        updated_at: parse_timestamp(&updated_at, "updated_at")?,
                    })
                },
            )
            .optional()?;
        Ok(set)
    }

    /// Drop every snapshot. Returns how many types were removed.
    pub fn clear(&mut self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM snapshots", [])?)
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
