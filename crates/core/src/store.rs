// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed store for deferred actions.
//!
//! The `offlineActions` table is the only durable record of a mutation made
//! while offline. Entries are appended once and afterwards only their status
//! bookkeeping changes; a successful replay deletes the row.

use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;

use crate::action::{ActionStatus, NewAction, PendingAction};
use crate::db::{open_connection, open_in_memory_connection, parse_db, parse_json};
use crate::error::{Error, Result};
use crate::id::{generate_action_id, now_millis};

/// SQL schema for the action queue.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS offlineActions (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    headers TEXT NOT NULL DEFAULT '{}',
    body TEXT,
    timestamp INTEGER NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    last_error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    claimed_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_offline_actions_timestamp ON offlineActions(timestamp);
CREATE INDEX IF NOT EXISTS idx_offline_actions_status ON offlineActions(status);
"#;

const COLUMNS: &str = "id, url, method, headers, body, timestamp, description, \
                       status, last_error, attempts, claimed_at";

const MAX_ID_ATTEMPTS: usize = 4;

fn row_to_action(row: &Row<'_>) -> std::result::Result<PendingAction, rusqlite::Error> {
    let method: String = row.get(2)?;
    let headers: String = row.get(3)?;
    let status: String = row.get(7)?;

    Ok(PendingAction {
        id: row.get(0)?,
        url: row.get(1)?,
        method: parse_db(&method, "method")?,
        headers: parse_json::<BTreeMap<String, String>>(&headers, "headers")?,
        body: row.get(4)?,
        timestamp: row.get(5)?,
        description: row.get(6)?,
        status: parse_db(&status, "status")?,
        last_error: row.get(8)?,
        attempts: row.get(9)?,
        claimed_at: row.get(10)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Durable queue of deferred actions.
pub struct ActionStore {
    conn: Connection,
}

impl ActionStore {
    /// Open the store at the given path, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(ActionStore {
            conn: open_connection(path, SCHEMA)?,
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(ActionStore {
            conn: open_in_memory_connection(SCHEMA)?,
        })
    }

    /// Append a new action, assigning its id and timestamp.
    ///
    /// The row is committed before this returns.
    pub fn append(&mut self, new: NewAction) -> Result<PendingAction> {
        new.validate()?;
        let timestamp = now_millis();
        let mut action = PendingAction::from_new(new, generate_action_id(timestamp), timestamp);

        for _ in 0..MAX_ID_ATTEMPTS {
            match self.insert(&action) {
                Ok(()) => return Ok(action),
                Err(Error::Database(e)) if is_constraint_violation(&e) => {
                    action.id = generate_action_id(timestamp);
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::CorruptedData(format!(
            "could not allocate a unique id for {}",
            action.label()
        )))
    }

    /// Insert a fully formed action inside its own transaction.
    pub fn insert(&mut self, action: &PendingAction) -> Result<()> {
        let headers = serde_json::to_string(&action.headers)?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO offlineActions (id, url, method, headers, body, timestamp,
             description, status, last_error, attempts, claimed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                action.id,
                action.url,
                action.method.as_str(),
                headers,
                action.body,
                action.timestamp,
                action.description,
                action.status.as_str(),
                action.last_error,
                action.attempts,
                action.claimed_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get an action by id.
    pub fn get(&self, id: &str) -> Result<PendingAction> {
        let sql = format!("SELECT {COLUMNS} FROM offlineActions WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], row_to_action)
            .optional()?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))
    }

    /// Claim every replay-eligible action as in flight, in FIFO order.
    ///
    /// Eligible entries are pending, failed, or in flight with a claim taken
    /// at or before `now_ms - claim_ttl_ms` (an abandoned session).
    /// Selection and claim happen in one immediate transaction so two
    /// processes sharing the file never claim the same entry.
    pub fn claim_pending(&mut self, claim_ttl_ms: i64) -> Result<Vec<PendingAction>> {
        self.claim_pending_at(now_millis(), claim_ttl_ms)
    }

    /// [`ActionStore::claim_pending`] with an explicit clock.
    pub fn claim_pending_at(&mut self, now_ms: i64, claim_ttl_ms: i64) -> Result<Vec<PendingAction>> {
        let stale_before = now_ms.saturating_sub(claim_ttl_ms);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut actions = {
            let sql = format!(
                "SELECT {COLUMNS} FROM offlineActions
                 WHERE status IN ('pending', 'failed')
                    OR (status = 'in_flight' AND (claimed_at IS NULL OR claimed_at <= ?1))
                 ORDER BY timestamp ASC, rowid ASC"
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params![stale_before], row_to_action)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        {
            let mut stmt = tx.prepare(
                "UPDATE offlineActions SET status = 'in_flight', claimed_at = ?1 WHERE id = ?2",
            )?;
            for action in &mut actions {
                stmt.execute(params![now_ms, action.id])?;
                action.status = ActionStatus::InFlight;
                action.claimed_at = Some(now_ms);
            }
        }

        tx.commit()?;
        Ok(actions)
    }

    /// Delete a successfully replayed action.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM offlineActions WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(Error::ActionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Record a failed replay; the entry stays eligible for the next session.
    pub fn mark_failed(&mut self, id: &str, error: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE offlineActions
             SET status = 'failed', last_error = ?1, attempts = attempts + 1, claimed_at = NULL
             WHERE id = ?2",
            params![error, id],
        )?;
        if affected == 0 {
            return Err(Error::ActionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Return unreplayed in-flight claims to pending. Returns how many were released.
    pub fn release(&mut self, ids: &[String]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut released = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE offlineActions SET status = 'pending', claimed_at = NULL
                 WHERE id = ?1 AND status = 'in_flight'",
            )?;
            for id in ids {
                released += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(released)
    }

    /// Number of unresolved actions.
    pub fn count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM offlineActions", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Number of actions with the given status.
    pub fn count_by_status(&self, status: ActionStatus) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM offlineActions WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// All unresolved actions in FIFO order, without claiming them.
    pub fn list(&self) -> Result<Vec<PendingAction>> {
        let sql = format!("SELECT {COLUMNS} FROM offlineActions ORDER BY timestamp ASC, rowid ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_action)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
