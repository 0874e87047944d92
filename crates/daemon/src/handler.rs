// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch for the agent.
//!
//! Each request maps to exactly one JSON reply. Store failures become
//! `{error}` replies; they never take the agent down.

use std::time::Instant;

use ck_core::SnapshotStore;
use ck_ipc::{
    to_reply, Ack, AgentInfo, AgentRequest, AgentStatus, CacheReadReply, ErrorReply, Pong,
    CAPABILITY_CACHE,
};
use serde_json::Value;

/// Outcome of handling one request.
pub struct Handled {
    pub reply: Value,
    pub shutdown: bool,
}

impl Handled {
    fn reply(reply: Value) -> Self {
        Handled {
            reply,
            shutdown: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Handled::reply(to_reply(&ErrorReply::new(message)))
    }
}

/// Agent state shared across connections.
pub struct Agent {
    store: SnapshotStore,
    started: Instant,
}

impl Agent {
    pub fn new(store: SnapshotStore) -> Self {
        Agent {
            store,
            started: Instant::now(),
        }
    }

    pub fn info() -> AgentInfo {
        AgentInfo {
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: vec![CAPABILITY_CACHE.to_string()],
        }
    }

    /// Decode and dispatch a raw request envelope.
    pub fn handle_raw(&mut self, raw: Value) -> Handled {
        match serde_json::from_value::<AgentRequest>(raw) {
            Ok(request) => self.handle(request),
            Err(e) => {
                tracing::warn!("rejected request: {}", e);
                Handled::error(format!("invalid request: {e}"))
            }
        }
    }

    pub fn handle(&mut self, request: AgentRequest) -> Handled {
        tracing::debug!(kind = request.kind(), "handling request");
        match request {
            AgentRequest::Ping => Handled::reply(to_reply(&Pong { pong: true })),
            AgentRequest::Status => Handled::reply(to_reply(&AgentStatus {
                info: Self::info(),
                uptime_secs: self.started.elapsed().as_secs(),
            })),
            AgentRequest::Hello { version } => {
                if version != env!("CARGO_PKG_VERSION") {
                    tracing::info!("client version {} differs from agent", version);
                }
                Handled::reply(to_reply(&Self::info()))
            }
            AgentRequest::Shutdown => Handled {
                reply: to_reply(&Ack::ok()),
                shutdown: true,
            },
            AgentRequest::CacheWrite(bundle) => match self.store.replace(&bundle) {
                Ok(types) => {
                    tracing::info!("cached {} entity types", types.len());
                    Handled::reply(to_reply(&Ack::ok()))
                }
                Err(e) => {
                    tracing::error!("cache write failed: {}", e);
                    Handled::error(e.to_string())
                }
            },
            AgentRequest::CacheStatus => match self.store.counts() {
                Ok(counts) => Handled::reply(to_reply(&counts)),
                Err(e) => Handled::error(e.to_string()),
            },
            AgentRequest::CacheClear => match self.store.clear() {
                Ok(removed) => {
                    tracing::info!("cleared {} cached entity types", removed);
                    Handled::reply(to_reply(&Ack::ok()))
                }
                Err(e) => Handled::error(e.to_string()),
            },
            AgentRequest::CacheRead { entity_type } => match self.store.read(entity_type) {
                Ok(snapshot) => Handled::reply(to_reply(&CacheReadReply { snapshot })),
                Err(e) => Handled::error(e.to_string()),
            },
            AgentRequest::SyncRegister { tag } => {
                tracing::debug!("declining sync registration '{}'", tag);
                Handled::error("replay is not supported by this agent")
            }
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
