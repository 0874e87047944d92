// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test doubles for the agent channel and the replay transport.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ck_core::{Method, NewAction, PendingAction};
use ck_ipc::{
    to_reply, Ack, AgentInfo, AgentRequest, CacheCounts, CacheReadReply, CachedEntitySet,
    EntityType, ErrorReply, CAPABILITY_CACHE,
};
use serde_json::Value;
use tokio::sync::Notify;

use crate::bridge::{AgentChannel, ChannelFuture};
use crate::error::Error;
use crate::sync::{ReplayFuture, Replayer};

/// State of the simulated agent.
#[derive(Debug)]
pub struct MockAgent {
    pub running: bool,
    pub version: String,
    pub capabilities: Vec<String>,
    /// Version the next launched agent reports.
    pub launch_version: String,
    pub fail_launch: bool,
    pub snapshots: BTreeMap<EntityType, CachedEntitySet>,
    pub requests: Vec<&'static str>,
    pub detect_calls: usize,
    pub launch_calls: usize,
    pub shutdown_calls: usize,
    /// Delay applied to every `send`.
    pub send_delay: Option<Duration>,
}

/// In-process stand-in for the agent socket.
#[derive(Clone)]
pub struct MockChannel {
    pub agent: Arc<Mutex<MockAgent>>,
}

impl MockChannel {
    fn with(running: bool, version: &str) -> Self {
        MockChannel {
            agent: Arc::new(Mutex::new(MockAgent {
                running,
                version: version.to_string(),
                capabilities: vec![CAPABILITY_CACHE.to_string()],
                launch_version: version.to_string(),
                fail_launch: false,
                snapshots: BTreeMap::new(),
                requests: Vec::new(),
                detect_calls: 0,
                launch_calls: 0,
                shutdown_calls: 0,
                send_delay: None,
            })),
        }
    }

    /// An agent that is already running at `version`.
    pub fn running(version: &str) -> Self {
        Self::with(true, version)
    }

    /// No agent running; a launch brings one up at `version`.
    pub fn stopped(version: &str) -> Self {
        Self::with(false, version)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockAgent> {
        self.agent.lock().unwrap()
    }

    fn info(agent: &MockAgent) -> AgentInfo {
        AgentInfo {
            pid: 4242,
            version: agent.version.clone(),
            capabilities: agent.capabilities.clone(),
        }
    }

    fn handle(agent: &mut MockAgent, request: AgentRequest) -> Value {
        match request {
            AgentRequest::CacheWrite(bundle) => {
                for (entity_type, records) in bundle.into_sets() {
                    agent
                        .snapshots
                        .insert(entity_type, CachedEntitySet::new(entity_type, records));
                }
                to_reply(&Ack::ok())
            }
            AgentRequest::CacheStatus => {
                let counts: CacheCounts = agent
                    .snapshots
                    .iter()
                    .map(|(t, s)| (*t, s.records.len() as u64))
                    .collect();
                to_reply(&counts)
            }
            AgentRequest::CacheClear => {
                agent.snapshots.clear();
                to_reply(&Ack::ok())
            }
            AgentRequest::CacheRead { entity_type } => to_reply(&CacheReadReply {
                snapshot: agent.snapshots.get(&entity_type).cloned(),
            }),
            AgentRequest::SyncRegister { .. } => {
                if agent.capabilities.iter().any(|c| c == "replay") {
                    to_reply(&Ack::ok())
                } else {
                    to_reply(&ErrorReply::new("replay is not supported"))
                }
            }
            AgentRequest::Hello { .. } => to_reply(&Self::info(agent)),
            AgentRequest::Ping => serde_json::json!({"pong": true}),
            AgentRequest::Status => serde_json::json!({
                "pid": 4242,
                "version": agent.version,
                "capabilities": agent.capabilities,
                "uptimeSecs": 1
            }),
            AgentRequest::Shutdown => {
                agent.running = false;
                to_reply(&Ack::ok())
            }
        }
    }
}

impl AgentChannel for MockChannel {
    fn detect(&self) -> ChannelFuture<'_, Option<AgentInfo>> {
        let mut agent = self.state();
        agent.detect_calls += 1;
        let info = agent.running.then(|| Self::info(&agent));
        Box::pin(async move { Ok(info) })
    }

    fn launch(&self) -> ChannelFuture<'_, AgentInfo> {
        let mut agent = self.state();
        agent.launch_calls += 1;
        let result = if agent.fail_launch {
            Err(Error::AgentLaunch("mock launch failure".to_string()))
        } else {
            agent.running = true;
            agent.version = agent.launch_version.clone();
            Ok(Self::info(&agent))
        };
        Box::pin(async move { result })
    }

    fn send(&self, request: AgentRequest) -> ChannelFuture<'_, Value> {
        Box::pin(async move {
            let delay = self.state().send_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let mut agent = self.state();
            if !agent.running {
                return Err(Error::AgentUnavailable);
            }
            agent.requests.push(request.kind());
            Ok(Self::handle(&mut agent, request))
        })
    }

    fn shutdown(&self) -> ChannelFuture<'_, ()> {
        let mut agent = self.state();
        agent.shutdown_calls += 1;
        agent.running = false;
        Box::pin(async move { Ok(()) })
    }
}

/// Lets a test hold one replay in flight.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until the gated replay has been dispatched.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the gated replay resolve.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct ReplayerState {
    calls: Vec<String>,
    rejected: HashSet<String>,
    gates: BTreeMap<String, Arc<Gate>>,
    delay: Option<Duration>,
}

/// Records replays instead of sending them.
#[derive(Clone, Default)]
pub struct MockReplayer {
    state: Arc<Mutex<ReplayerState>>,
}

impl MockReplayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every replay of `url`.
    pub fn reject(&self, url: &str) {
        self.state.lock().unwrap().rejected.insert(url.to_string());
    }

    /// Block replays of `url` until the returned gate is released.
    pub fn hold(&self, url: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.state
            .lock()
            .unwrap()
            .gates
            .insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    /// Delay every replay.
    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    /// URLs replayed so far, in dispatch order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl Replayer for MockReplayer {
    fn replay<'a>(&'a self, action: &'a PendingAction) -> ReplayFuture<'a> {
        Box::pin(async move {
            let (gate, delay, rejected) = {
                let mut state = self.state.lock().unwrap();
                state.calls.push(action.url.clone());
                (
                    state.gates.get(&action.url).cloned(),
                    state.delay,
                    state.rejected.contains(&action.url),
                )
            };
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if rejected {
                return Err(Error::NetworkReplayFailed {
                    id: action.id.clone(),
                    reason: "HTTP 422 Unprocessable Entity".to_string(),
                });
            }
            Ok(())
        })
    }
}

/// A POST to `url` with a small JSON body.
pub fn post(url: &str) -> NewAction {
    NewAction::new(Method::Post, url)
        .header("Content-Type", "application/json")
        .body("{}")
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check().await
}

/// Drop the action table under an open store so its next transaction fails.
pub fn break_store(path: &Path) {
    rusqlite::Connection::open(path)
        .unwrap()
        .execute_batch("DROP TABLE offlineActions")
        .unwrap();
}
