// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the agent bridge.
//!
//! [`AgentChannel`] hides how the agent is reached so the bridge can be
//! driven by a mock in tests. [`SocketChannel`] is the production channel:
//! a single-use Unix socket connection per request.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use ck_ipc::framing::async_io;
use ck_ipc::{AgentInfo, AgentRequest};
use serde_json::Value;
use tokio::net::UnixStream;

use super::lifecycle;
use crate::config::Config;
use crate::error::Result;

/// Boxed future returned by channel operations.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Channel to an out-of-process agent.
pub trait AgentChannel: Send + Sync + 'static {
    /// Handshake with a running agent, if any.
    fn detect(&self) -> ChannelFuture<'_, Option<AgentInfo>>;

    /// Start an agent and return its handshake info.
    fn launch(&self) -> ChannelFuture<'_, AgentInfo>;

    /// Send one request and resolve on its single reply.
    ///
    /// Fails with `AgentUnavailable` when the agent cannot be reached.
    fn send(&self, request: AgentRequest) -> ChannelFuture<'_, Value>;

    /// Ask the running agent to exit.
    fn shutdown(&self) -> ChannelFuture<'_, ()>;
}

/// Unix socket channel to `carekeepd`.
#[derive(Debug, Clone)]
pub struct SocketChannel {
    agent_dir: PathBuf,
    binary: PathBuf,
    client_version: String,
}

impl SocketChannel {
    pub fn new(agent_dir: impl Into<PathBuf>, binary: impl Into<PathBuf>) -> Self {
        SocketChannel {
            agent_dir: agent_dir.into(),
            binary: binary.into(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.agent_dir(),
            lifecycle::find_agent_binary(config.agent.binary.as_deref()),
        )
    }

    pub fn agent_dir(&self) -> &Path {
        &self.agent_dir
    }

    /// Run a blocking lifecycle function on the blocking pool.
    fn blocking<T, F>(&self, f: F) -> ChannelFuture<'_, T>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf, PathBuf, String) -> Result<T> + Send + 'static,
    {
        let agent_dir = self.agent_dir.clone();
        let binary = self.binary.clone();
        let version = self.client_version.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || f(agent_dir, binary, version)).await?
        })
    }
}

impl AgentChannel for SocketChannel {
    fn detect(&self) -> ChannelFuture<'_, Option<AgentInfo>> {
        self.blocking(|dir, _, version| lifecycle::detect_agent(&dir, &version))
    }

    fn launch(&self) -> ChannelFuture<'_, AgentInfo> {
        self.blocking(|dir, binary, version| lifecycle::spawn_agent(&dir, &binary, &version))
    }

    fn send(&self, request: AgentRequest) -> ChannelFuture<'_, Value> {
        Box::pin(async move {
            let socket_path = lifecycle::get_socket_path(&self.agent_dir);
            let mut stream = UnixStream::connect(&socket_path)
                .await
                .map_err(lifecycle::connect_error)?;
            async_io::write_message(&mut stream, &request).await?;
            let reply: Value = async_io::read_message(&mut stream).await?;
            Ok(reply)
        })
    }

    fn shutdown(&self) -> ChannelFuture<'_, ()> {
        self.blocking(|dir, _, _| lifecycle::stop_agent_forcefully(&dir))
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
