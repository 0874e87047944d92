// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge to the out-of-process background agent.
//!
//! The bridge tracks whether an agent is active, forwards typed requests to
//! it with a bounded timeout and watches for version drift on a coarse
//! timer. It never retries and never restarts the agent on its own.

mod channel;
pub mod lifecycle;

pub use channel::{AgentChannel, ChannelFuture, SocketChannel};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use ck_ipc::{
    parse_reply, Ack, AgentInfo, AgentRequest, AgentStatus, CacheCounts, CacheReadReply,
    CachedEntitySet, EntityBundle, EntityType,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::Config;
use crate::error::{Error, Result};

/// Bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub autostart: bool,
    pub call_timeout: Duration,
    pub update_check: Duration,
    pub client_version: String,
}

impl BridgeConfig {
    pub fn from_config(config: &Config) -> Self {
        BridgeConfig {
            autostart: config.agent.autostart,
            call_timeout: config.call_timeout(),
            update_check: config.update_check_interval(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig::from_config(&Config::default())
    }
}

/// Bridge to the background agent.
pub struct AgentBridge<C: AgentChannel = SocketChannel> {
    channel: Arc<C>,
    config: BridgeConfig,
    active: AtomicBool,
    update_available: AtomicBool,
    agent: Mutex<Option<AgentInfo>>,
    register_lock: tokio::sync::Mutex<()>,
    update_timer: Mutex<Option<DropGuard>>,
}

impl AgentBridge<SocketChannel> {
    pub fn from_config(config: &Config) -> Self {
        AgentBridge::new(
            SocketChannel::from_config(config),
            BridgeConfig::from_config(config),
        )
    }
}

impl<C: AgentChannel> AgentBridge<C> {
    pub fn new(channel: C, config: BridgeConfig) -> Self {
        AgentBridge {
            channel: Arc::new(channel),
            config,
            active: AtomicBool::new(false),
            update_available: AtomicBool::new(false),
            agent: Mutex::new(None),
            register_lock: tokio::sync::Mutex::new(()),
            update_timer: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// True once the update timer saw an agent whose version differs from ours.
    pub fn update_available(&self) -> bool {
        self.update_available.load(Ordering::SeqCst)
    }

    /// Handshake info of the active agent.
    pub fn agent_info(&self) -> Option<AgentInfo> {
        self.agent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn set_agent(&self, info: Option<AgentInfo>) {
        match &info {
            Some(info) => {
                let drift = info.version != self.config.client_version;
                if drift && !self.update_available.swap(true, Ordering::SeqCst) {
                    tracing::info!(
                        "agent {} differs from client {}; update available",
                        info.version,
                        self.config.client_version
                    );
                } else if !drift {
                    self.update_available.store(false, Ordering::SeqCst);
                }
                self.active.store(true, Ordering::SeqCst);
            }
            None => {
                if self.active.swap(false, Ordering::SeqCst) {
                    tracing::warn!("background agent is no longer reachable");
                }
            }
        }
        *self.agent.lock().unwrap_or_else(|p| p.into_inner()) = info;
    }

    /// Detect or launch the agent and install the update timer.
    ///
    /// Idempotent: concurrent and repeated calls are serialized, and an
    /// already-active bridge returns immediately. Returns whether an agent is
    /// active afterwards.
    pub async fn register(self: &Arc<Self>) -> Result<bool> {
        let _guard = self.register_lock.lock().await;
        self.install_update_timer();

        if self.is_active() {
            return Ok(true);
        }

        let info = match self.channel.detect().await? {
            Some(info) => Some(info),
            None if self.config.autostart => {
                tracing::info!("no background agent running; launching one");
                Some(self.channel.launch().await?)
            }
            None => None,
        };

        match info {
            Some(info) => {
                tracing::info!(pid = info.pid, version = %info.version, "background agent active");
                self.set_agent(Some(info));
            }
            None => tracing::info!("no background agent; continuing without one"),
        }
        Ok(self.is_active())
    }

    fn install_update_timer(self: &Arc<Self>) {
        let mut slot = self.update_timer.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.update_check;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(bridge) = weak.upgrade() else {
                    break;
                };
                bridge.check_for_update().await;
            }
            tracing::debug!("agent update timer stopped");
        });

        *slot = Some(cancel.drop_guard());
    }

    /// One update-timer tick: re-handshake and record drift or disappearance.
    pub async fn check_for_update(&self) {
        match self.channel.detect().await {
            Ok(info) => self.set_agent(info),
            Err(e) => tracing::warn!("agent update check failed: {}", e),
        }
    }

    /// Restart the agent after a flagged version change.
    ///
    /// Returns `false` when no update was flagged.
    pub async fn apply_update(&self) -> Result<bool> {
        let _guard = self.register_lock.lock().await;
        if !self.update_available() {
            return Ok(false);
        }

        tracing::info!("restarting background agent to apply update");
        if let Err(e) = self.channel.shutdown().await {
            tracing::warn!("agent shutdown before update failed: {}", e);
        }
        self.set_agent(None);

        let info = self.channel.launch().await?;
        self.set_agent(Some(info));
        Ok(true)
    }

    /// Send a request and wait for its reply.
    pub async fn call(&self, request: AgentRequest) -> Result<Value> {
        if !self.is_active() {
            return Err(Error::AgentUnavailable);
        }

        let kind = request.kind();
        let timeout = self.config.call_timeout;
        match tokio::time::timeout(timeout, self.channel.send(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(Error::AgentUnavailable)) => {
                self.set_agent(None);
                Err(Error::AgentUnavailable)
            }
            Ok(Err(e)) => {
                tracing::warn!("{} failed: {}", kind, e);
                Err(e)
            }
            Err(_) => {
                tracing::warn!("{} timed out after {:?}", kind, timeout);
                Err(Error::AgentTimeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn call_typed<T: DeserializeOwned>(&self, request: AgentRequest) -> Result<T> {
        let reply = self.call(request).await?;
        Ok(parse_reply(reply)?)
    }

    pub async fn cache_write(&self, bundle: EntityBundle) -> Result<bool> {
        let ack: Ack = self.call_typed(AgentRequest::CacheWrite(bundle)).await?;
        Ok(ack.success)
    }

    pub async fn cache_status(&self) -> Result<CacheCounts> {
        self.call_typed(AgentRequest::CacheStatus).await
    }

    pub async fn cache_clear(&self) -> Result<bool> {
        let ack: Ack = self.call_typed(AgentRequest::CacheClear).await?;
        Ok(ack.success)
    }

    pub async fn cache_read(&self, entity_type: EntityType) -> Result<Option<CachedEntitySet>> {
        let reply: CacheReadReply = self
            .call_typed(AgentRequest::CacheRead { entity_type })
            .await?;
        Ok(reply.snapshot)
    }

    /// Ask the agent to register its own durable replay under `tag`.
    pub async fn sync_register(&self, tag: impl Into<String>) -> Result<bool> {
        let ack: Ack = self
            .call_typed(AgentRequest::SyncRegister { tag: tag.into() })
            .await?;
        Ok(ack.success)
    }

    pub async fn status(&self) -> Result<AgentStatus> {
        self.call_typed(AgentRequest::Status).await
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
