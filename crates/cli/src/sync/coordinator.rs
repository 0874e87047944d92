// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync session state machine.
//!
//! A session claims the queued batch and replays it in FIFO order on a
//! worker task. The session itself races that worker against the deadline
//! and the stop token; whichever wins decides the outcome. Losing the race
//! only tells the worker to stop scheduling: the call it already dispatched
//! still resolves and records its result. The entries it never reached are
//! released back to Pending before the session publishes its report.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ck_core::PendingAction;
use ck_ipc::CAPABILITY_REPLAY;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::replay::{HttpReplayer, Replayer};
use crate::bridge::{AgentBridge, AgentChannel, SocketChannel};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::events::{EventBus, Subscription};
use crate::queue::WriteQueue;

/// Tag under which an agent with replay support registers its own sync.
pub const SYNC_TAG: &str = "carekeep-offline-actions";

/// What started a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    ConnectivityRestored,
    Resumed,
    Manual,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncTrigger::ConnectivityRestored => "connectivity_restored",
            SyncTrigger::Resumed => "resumed",
            SyncTrigger::Manual => "manual",
        })
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every claimed action was replayed.
    Completed,
    /// `stop_sync` was called.
    Cancelled,
    /// The session deadline passed first.
    TimedOut,
    /// The batch could not be claimed from the store.
    Aborted,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncOutcome::Completed => "completed",
            SyncOutcome::Cancelled => "cancelled",
            SyncOutcome::TimedOut => "timed_out",
            SyncOutcome::Aborted => "aborted",
        })
    }
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Summary published once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub session_id: u64,
    pub trigger: SyncTrigger,
    pub outcome: SyncOutcome,
    pub succeeded: u32,
    pub failed: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Handle to a started session.
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
    done: oneshot::Receiver<SyncReport>,
    settled: oneshot::Receiver<()>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the session's report.
    pub async fn wait(self) -> Result<SyncReport> {
        self.done
            .await
            .map_err(|_| Error::Runtime(format!("sync session {} was dropped", self.id)))
    }

    /// Wait for the report, then for the replay already dispatched when the
    /// session ended to record its result.
    ///
    /// Use this before shutting the runtime down.
    pub async fn wait_settled(self) -> Result<SyncReport> {
        let id = self.id;
        let report = self
            .done
            .await
            .map_err(|_| Error::Runtime(format!("sync session {id} was dropped")))?;
        let _ = self.settled.await;
        Ok(report)
    }
}

/// Result of [`SyncCoordinator::start_sync`].
#[derive(Debug)]
pub enum SyncStart {
    Started(SessionHandle),
    /// A session is already running; nothing was queued.
    AlreadySyncing(u64),
    /// Offline; no session was created.
    Offline,
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub deadline: Duration,
    pub delegate_to_agent: bool,
}

impl CoordinatorConfig {
    pub fn from_config(config: &Config) -> Self {
        CoordinatorConfig {
            deadline: config.sync_deadline(),
            delegate_to_agent: config.sync.delegate_to_agent,
        }
    }
}

struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    active: Option<ActiveSession>,
    last_report: Option<SyncReport>,
}

/// Claimed entries the worker has not started yet.
type Claimed = Arc<Mutex<VecDeque<PendingAction>>>;

fn lock_claimed(claimed: &Claimed) -> MutexGuard<'_, VecDeque<PendingAction>> {
    claimed.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Default)]
struct Tally {
    succeeded: AtomicU32,
    failed: AtomicU32,
}

/// Drains the write queue against the backend.
pub struct SyncCoordinator<R: Replayer = HttpReplayer, C: AgentChannel = SocketChannel> {
    queue: WriteQueue,
    replayer: Arc<R>,
    bridge: Arc<AgentBridge<C>>,
    connectivity: Arc<ConnectivityMonitor>,
    config: CoordinatorConfig,
    runtime: Handle,
    next_id: AtomicU64,
    inner: Mutex<Inner>,
    completed: EventBus<SyncReport>,
}

impl<R: Replayer, C: AgentChannel> SyncCoordinator<R, C> {
    /// Create a coordinator bound to the current tokio runtime.
    pub fn new(
        queue: WriteQueue,
        replayer: R,
        bridge: Arc<AgentBridge<C>>,
        connectivity: Arc<ConnectivityMonitor>,
        config: CoordinatorConfig,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::Runtime(format!("sync coordinator needs a tokio runtime: {e}"))
        })?;
        Ok(Arc::new(SyncCoordinator {
            queue,
            replayer: Arc::new(replayer),
            bridge,
            connectivity,
            config,
            runtime,
            next_id: AtomicU64::new(0),
            inner: Mutex::new(Inner::default()),
            completed: EventBus::new(),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn state(&self) -> SyncState {
        if self.lock().active.is_some() {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.lock().last_report.clone()
    }

    pub fn subscribe_completed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncReport) + Send + Sync + 'static,
    {
        self.completed.subscribe(listener)
    }

    /// Start a session unless one is running or the monitor reports offline.
    pub fn start_sync(self: &Arc<Self>, trigger: SyncTrigger) -> SyncStart {
        if !self.connectivity.is_online() {
            tracing::debug!(%trigger, "sync skipped while offline");
            return SyncStart::Offline;
        }

        let (id, cancel) = {
            let mut inner = self.lock();
            if let Some(active) = &inner.active {
                tracing::debug!(%trigger, session = active.id, "sync already running");
                return SyncStart::AlreadySyncing(active.id);
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let cancel = CancellationToken::new();
            inner.active = Some(ActiveSession {
                id,
                cancel: cancel.clone(),
            });
            (id, cancel)
        };

        tracing::info!(session = id, %trigger, "sync started");
        let (tx, rx) = oneshot::channel();
        let (settled_tx, settled_rx) = oneshot::channel();
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let (report, worker) = this.run_session(id, trigger, cancel).await;
            let _ = tx.send(report);
            if let Some(worker) = worker {
                let _ = worker.await;
            }
            let _ = settled_tx.send(());
        });
        SyncStart::Started(SessionHandle {
            id,
            done: rx,
            settled: settled_rx,
        })
    }

    /// Cancel the running session. Returns whether one was running.
    ///
    /// The coordinator is Idle when this returns; the session still
    /// publishes its Cancelled report.
    pub fn stop_sync(&self) -> bool {
        let active = self.lock().active.take();
        match active {
            Some(session) => {
                tracing::info!(session = session.id, "sync stop requested");
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    async fn run_session(
        self: Arc<Self>,
        id: u64,
        trigger: SyncTrigger,
        cancel: CancellationToken,
    ) -> (SyncReport, Option<JoinHandle<Result<()>>>) {
        let started_at = Utc::now();
        let tally = Arc::new(Tally::default());
        let claimed = Claimed::default();
        let stop = cancel.child_token();

        let mut worker = self.runtime.spawn(Arc::clone(&self).replay_batch(
            id,
            stop.clone(),
            Arc::clone(&tally),
            Arc::clone(&claimed),
        ));
        let deadline = tokio::time::sleep(self.config.deadline);

        let outcome = tokio::select! {
            biased;
            joined = &mut worker => match joined {
                Ok(Ok(())) => SyncOutcome::Completed,
                Ok(Err(e)) => {
                    tracing::error!(session = id, "sync aborted: {}", e);
                    SyncOutcome::Aborted
                }
                Err(e) => {
                    tracing::error!(session = id, "sync worker failed: {}", e);
                    SyncOutcome::Aborted
                }
            },
            _ = cancel.cancelled() => SyncOutcome::Cancelled,
            _ = deadline => {
                tracing::warn!(session = id, "sync deadline of {:?} passed", self.config.deadline);
                SyncOutcome::TimedOut
            }
        };

        let worker = match outcome {
            SyncOutcome::Cancelled | SyncOutcome::TimedOut => {
                stop.cancel();
                self.release_unstarted(id, &claimed).await;
                Some(worker)
            }
            SyncOutcome::Completed | SyncOutcome::Aborted => None,
        };

        let report = SyncReport {
            session_id: id,
            trigger,
            outcome,
            succeeded: tally.succeeded.load(Ordering::SeqCst),
            failed: tally.failed.load(Ordering::SeqCst),
            started_at,
            finished_at: Utc::now(),
        };

        {
            let mut inner = self.lock();
            if inner.active.as_ref().map(|a| a.id) == Some(id) {
                inner.active = None;
            }
            inner.last_report = Some(report.clone());
        }

        tracing::info!(
            session = id,
            outcome = %report.outcome,
            succeeded = report.succeeded,
            failed = report.failed,
            "sync finished"
        );
        self.completed.publish(&report);
        (report, worker)
    }

    /// Return every claimed entry the worker has not started to Pending.
    async fn release_unstarted(&self, session: u64, claimed: &Claimed) {
        let ids: Vec<String> = lock_claimed(claimed).drain(..).map(|a| a.id).collect();
        if ids.is_empty() {
            return;
        }
        match self.queue.release(ids).await {
            Ok(n) => tracing::debug!(session, "released {} unreplayed actions", n),
            Err(e) => tracing::error!(session, "failed to release claimed actions: {}", e),
        }
    }

    async fn delegate_to_agent(&self) {
        match self.bridge.agent_info() {
            Some(info) if self.bridge.is_active() && info.has_capability(CAPABILITY_REPLAY) => {
                match self.bridge.sync_register(SYNC_TAG).await {
                    Ok(true) => tracing::info!("agent registered background replay"),
                    Ok(false) => tracing::warn!("agent declined background replay"),
                    Err(e) => tracing::warn!("agent replay registration failed: {}", e),
                }
            }
            _ => tracing::debug!("agent cannot replay; replaying in process"),
        }
    }

    async fn replay_batch(
        self: Arc<Self>,
        session: u64,
        stop: CancellationToken,
        tally: Arc<Tally>,
        claimed: Claimed,
    ) -> Result<()> {
        if self.config.delegate_to_agent {
            self.delegate_to_agent().await;
        }
        if stop.is_cancelled() {
            return Ok(());
        }

        let batch = self.queue.dequeue_batch().await?;
        lock_claimed(&claimed).extend(batch);

        loop {
            // The stop check and the pop share the lock, so the session's
            // release never races a replay that is about to start.
            let next = {
                let mut pending = lock_claimed(&claimed);
                if stop.is_cancelled() {
                    None
                } else {
                    pending.pop_front()
                }
            };
            let Some(action) = next else {
                break;
            };

            match self.replayer.replay(&action).await {
                Ok(()) => {
                    tally.succeeded.fetch_add(1, Ordering::SeqCst);
                    if let Err(e) = self.queue.mark_synced(&action.id).await {
                        tracing::error!(id = %action.id, "replayed but not removed: {}", e);
                    }
                }
                Err(e) => {
                    tally.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(id = %action.id, "replay of {} failed: {}", action.label(), e);
                    if let Err(e) = self.queue.mark_failed(&action.id, &e.to_string()).await {
                        tracing::error!(id = %action.id, "failed to record replay error: {}", e);
                    }
                }
            }
        }

        // Stopped before the claim landed: the session found nothing to release.
        self.release_unstarted(session, &claimed).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
