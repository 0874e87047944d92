// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the carekeep library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("background agent is not available\n  hint: start it with 'carekeep agent start'")]
    AgentUnavailable,

    #[error("background agent did not reply within {0} ms")]
    AgentTimeout(u64),

    #[error("background agent protocol error: {0}")]
    AgentProtocol(String),

    #[error("failed to launch background agent: {0}")]
    AgentLaunch(String),

    #[error("local store transaction failed: {0}")]
    StoreTransactionFailed(String),

    #[error("replay of action {id} failed: {reason}")]
    NetworkReplayFailed { id: String, reason: String },

    #[error("pending action not found: {0}")]
    ActionNotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// A specialized Result type for carekeep operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<ck_core::Error> for Error {
    fn from(e: ck_core::Error) -> Self {
        match e {
            ck_core::Error::ActionNotFound(id) => Error::ActionNotFound(id),
            e @ (ck_core::Error::InvalidStatus(_)
            | ck_core::Error::InvalidEntityType(_)
            | ck_core::Error::InvalidMethod(_)
            | ck_core::Error::FieldEmpty { .. }) => Error::InvalidInput(e.to_string()),
            ck_core::Error::Io(e) => Error::Io(e),
            e @ (ck_core::Error::Database(_)
            | ck_core::Error::Json(_)
            | ck_core::Error::CorruptedData(_)) => Error::StoreTransactionFailed(e.to_string()),
        }
    }
}

impl From<ck_ipc::ReplyError> for Error {
    fn from(e: ck_ipc::ReplyError) -> Self {
        Error::AgentProtocol(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Runtime(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
