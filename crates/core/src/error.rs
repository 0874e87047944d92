// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ck-core operations.

use thiserror::Error;

/// All possible errors that can occur in ck-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("pending action not found: {0}")]
    ActionNotFound(String),

    #[error("invalid action status: '{0}'\n  hint: valid statuses are: pending, in_flight, synced, failed")]
    InvalidStatus(String),

    #[error("invalid entity type: '{0}'\n  hint: valid types are: patients, appointments, doctors, clinics, patientHealth, payments")]
    InvalidEntityType(String),

    #[error("invalid HTTP method: '{0}'")]
    InvalidMethod(String),

    #[error("{field} cannot be empty")]
    FieldEmpty { field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for ck-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
