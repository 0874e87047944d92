// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wire protocol between the carekeep bridge and its background agent.
//!
//! Every exchange is one request envelope `{type, data?}` answered by exactly
//! one reply. Replies are plain JSON objects whose shape depends on the
//! request type; any failure is reported as `{"error": "..."}`. Messages are
//! serialized as JSON with length-prefixed framing.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use ck_core::{CacheCounts, CachedEntitySet, EntityBundle, EntityType};

/// Capability advertised by agents that can replay queued actions themselves.
pub const CAPABILITY_REPLAY: &str = "replay";

/// Capability advertised by agents that keep entity snapshots.
pub const CAPABILITY_CACHE: &str = "cache";

/// Request sent from the bridge to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRequest {
    /// Replace the snapshots of the covered entity types.
    CacheWrite(EntityBundle),
    /// Record counts per cached entity type.
    CacheStatus,
    /// Drop every snapshot.
    CacheClear,
    /// Read one entity type's snapshot.
    CacheRead {
        #[serde(rename = "entityType")]
        entity_type: EntityType,
    },
    /// Ask the agent to register its own durable replay under `tag`.
    SyncRegister { tag: String },
    /// Liveness check.
    Ping,
    /// Agent status.
    Status,
    /// Version handshake.
    Hello { version: String },
    /// Graceful shutdown.
    Shutdown,
}

impl AgentRequest {
    /// Wire name of the request type.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentRequest::CacheWrite(_) => "CACHE_WRITE",
            AgentRequest::CacheStatus => "CACHE_STATUS",
            AgentRequest::CacheClear => "CACHE_CLEAR",
            AgentRequest::CacheRead { .. } => "CACHE_READ",
            AgentRequest::SyncRegister { .. } => "SYNC_REGISTER",
            AgentRequest::Ping => "PING",
            AgentRequest::Status => "STATUS",
            AgentRequest::Hello { .. } => "HELLO",
            AgentRequest::Shutdown => "SHUTDOWN",
        }
    }
}

// ============================================================================
// Reply shapes
// ============================================================================

/// `{success}` reply to `CACHE_WRITE`, `CACHE_CLEAR`, `SYNC_REGISTER` and `SHUTDOWN`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Ack { success: true }
    }
}

/// `{error}` reply to any failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReply {
    pub error: String,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorReply {
            error: error.into(),
        }
    }
}

/// `{pong}` reply to `PING`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    pub pong: bool,
}

/// Identity of a running agent, the reply to `HELLO`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentInfo {
    pub pid: u32,
    pub version: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl AgentInfo {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Reply to `STATUS`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    #[serde(flatten)]
    pub info: AgentInfo,
    pub uptime_secs: u64,
}

/// Reply to `CACHE_READ`; `snapshot` is null when the type was never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheReadReply {
    pub snapshot: Option<CachedEntitySet>,
}

/// Failure decoding a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyError {
    /// The agent answered with `{error}`.
    Agent(String),
    /// The reply did not have the expected shape.
    Malformed(String),
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyError::Agent(msg) => write!(f, "agent error: {}", msg),
            ReplyError::Malformed(msg) => write!(f, "malformed reply: {}", msg),
        }
    }
}

impl std::error::Error for ReplyError {}

/// Decode a reply, surfacing `{error}` replies as [`ReplyError::Agent`].
pub fn parse_reply<T: DeserializeOwned>(reply: Value) -> Result<T, ReplyError> {
    if let Some(error) = reply.get("error") {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(ReplyError::Agent(message));
    }
    serde_json::from_value(reply).map_err(|e| ReplyError::Malformed(e.to_string()))
}

/// Encode any reply shape as a JSON value.
pub fn to_reply<T: Serialize>(reply: &T) -> Value {
    serde_json::to_value(reply)
        .unwrap_or_else(|e| serde_json::json!({ "error": format!("encode failed: {e}") }))
}

// ============================================================================
// Message framing
// ============================================================================

/// Message framing.
///
/// Messages are framed as:
/// - 4 bytes: message length (big-endian u32)
/// - N bytes: JSON-encoded message
pub mod framing {
    use std::io::{Read, Write};

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    /// Maximum message size (16MB); snapshot payloads can be large.
    pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

    fn encode<T: Serialize>(message: &T) -> std::io::Result<(u32, Vec<u8>)> {
        let json = serde_json::to_vec(message)
            .map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))?;
        if json.len() > MAX_MESSAGE_SIZE {
            return Err(std::io::Error::other(format!(
                "message too large: {} bytes (max {})",
                json.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let len =
            u32::try_from(json.len()).map_err(|_| std::io::Error::other("message too large"))?;
        Ok((len, json))
    }

    fn check_len(len: usize) -> std::io::Result<()> {
        if len > MAX_MESSAGE_SIZE {
            return Err(std::io::Error::other(format!(
                "message too large: {} bytes (max {})",
                len, MAX_MESSAGE_SIZE
            )));
        }
        Ok(())
    }

    fn decode<T: DeserializeOwned>(buf: &[u8]) -> std::io::Result<T> {
        serde_json::from_slice(buf)
            .map_err(|e| std::io::Error::other(format!("deserialize error: {}", e)))
    }

    /// Write a serializable message to the given writer.
    pub fn write_message<W: Write, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        let (len, json) = encode(message)?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&json)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a deserializable message from the given reader.
    pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        check_len(len)?;

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        decode(&buf)
    }

    /// Async variants over tokio I/O.
    pub mod async_io {
        use serde::de::DeserializeOwned;
        use serde::Serialize;
        use ::tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

        /// Write a serializable message to the given async writer.
        pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(
            writer: &mut W,
            message: &T,
        ) -> std::io::Result<()> {
            let (len, json) = super::encode(message)?;
            writer.write_all(&len.to_be_bytes()).await?;
            writer.write_all(&json).await?;
            writer.flush().await?;
            Ok(())
        }

        /// Read a deserializable message from the given async reader.
        pub async fn read_message<R: AsyncRead + Unpin, T: DeserializeOwned>(
            reader: &mut R,
        ) -> std::io::Result<T> {
            let mut len_buf = [0u8; 4];
            reader.read_exact(&mut len_buf).await?;
            let len = u32::from_be_bytes(len_buf) as usize;
            super::check_len(len)?;

            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            super::decode(&buf)
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
