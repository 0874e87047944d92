// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The single entry point composing connectivity, agent, cache, queue and sync.
//!
//! Callers only see structured events and queryable state. With auto-sync
//! enabled, a connectivity restoration or a resume hint while online starts
//! a session on its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ck_core::{ActionStatus, NewAction, PendingAction};
use ck_ipc::{EntityBundle, EntityType};
use serde_json::Value;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::bridge::{AgentBridge, AgentChannel, SocketChannel};
use crate::cache::{CacheOutcome, CacheStatus, FallbackRead, ReadCache, ReadThrough};
use crate::config::Config;
use crate::connectivity::{
    spawn_watcher, ConnectivityEvent, ConnectivityMonitor, ConnectivityState, ReachabilityProbe,
    TcpProbe,
};
use crate::error::Result;
use crate::events::Subscription;
use crate::queue::WriteQueue;
use crate::sync::{
    CoordinatorConfig, HttpReplayer, Replayer, SyncCoordinator, SyncReport, SyncStart, SyncState,
    SyncTrigger,
};

/// Offline-resilience layer of the portal.
pub struct OfflineFacade<R: Replayer = HttpReplayer, C: AgentChannel = SocketChannel> {
    connectivity: Arc<ConnectivityMonitor>,
    bridge: Arc<AgentBridge<C>>,
    cache: ReadCache<C>,
    queue: WriteQueue,
    coordinator: Arc<SyncCoordinator<R, C>>,
    _auto_sync: Option<Subscription>,
    watcher: Option<DropGuard>,
}

impl OfflineFacade {
    /// Build every component from `config`, register the agent and start
    /// the reachability watcher when a probe address is configured.
    ///
    /// An unavailable agent is logged and tolerated.
    pub async fn open(config: &Config) -> Result<Self> {
        let queue = WriteQueue::open(&config.store_path(), config.claim_ttl())?;
        let replayer = HttpReplayer::new(config.replay.base_url.clone(), config.request_timeout())?;
        let bridge = Arc::new(AgentBridge::from_config(config));
        let connectivity = Arc::new(ConnectivityMonitor::new(true));

        let mut facade = OfflineFacade::from_parts(
            queue,
            replayer,
            bridge,
            connectivity,
            CoordinatorConfig::from_config(config),
            config.sync.auto_sync,
        )?;

        if let Err(e) = facade.bridge.register().await {
            tracing::warn!("continuing without background agent: {}", e);
        }

        if let Some(addr) = &config.connectivity.probe_addr {
            facade.watch(
                Arc::new(TcpProbe::new(addr.clone(), config.probe_timeout())),
                config.probe_interval(),
            );
        }
        Ok(facade)
    }
}

impl<R: Replayer, C: AgentChannel> OfflineFacade<R, C> {
    /// Compose injected collaborators. Must run inside a tokio runtime.
    pub fn from_parts(
        queue: WriteQueue,
        replayer: R,
        bridge: Arc<AgentBridge<C>>,
        connectivity: Arc<ConnectivityMonitor>,
        config: CoordinatorConfig,
        auto_sync: bool,
    ) -> Result<Self> {
        let coordinator = SyncCoordinator::new(
            queue.clone(),
            replayer,
            Arc::clone(&bridge),
            Arc::clone(&connectivity),
            config,
        )?;

        let auto_sync = auto_sync.then(|| {
            let weak = Arc::downgrade(&coordinator);
            connectivity.subscribe(move |event| {
                let trigger = match event {
                    ConnectivityEvent::Changed { online: true, .. } => {
                        SyncTrigger::ConnectivityRestored
                    }
                    ConnectivityEvent::Resumed { .. } => SyncTrigger::Resumed,
                    ConnectivityEvent::Changed { online: false, .. } => return,
                };
                if let Some(coordinator) = weak.upgrade() {
                    if let SyncStart::Started(session) = coordinator.start_sync(trigger) {
                        tracing::debug!(session = session.id(), %trigger, "auto-sync started");
                    }
                }
            })
        });

        Ok(OfflineFacade {
            cache: ReadCache::new(Arc::clone(&bridge)),
            connectivity,
            bridge,
            queue,
            coordinator,
            _auto_sync: auto_sync,
            watcher: None,
        })
    }

    /// Feed reachability from `probe` every `interval` until the facade is dropped.
    pub fn watch(&mut self, probe: Arc<dyn ReachabilityProbe>, interval: Duration) {
        let cancel = CancellationToken::new();
        drop(spawn_watcher(
            Arc::clone(&self.connectivity),
            probe,
            interval,
            cancel.clone(),
        ));
        self.watcher = Some(cancel.drop_guard());
    }

    pub fn bridge(&self) -> &Arc<AgentBridge<C>> {
        &self.bridge
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn connectivity_state(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    pub fn is_agent_active(&self) -> bool {
        self.bridge.is_active()
    }

    /// Feed a platform online/offline signal.
    pub fn set_online(&self, online: bool) -> bool {
        self.connectivity.set_online(online)
    }

    /// Feed a foreground-resume signal.
    pub fn notify_resumed(&self) -> bool {
        self.connectivity.notify_resumed()
    }

    pub async fn cache_medical_data(&self, bundle: EntityBundle) -> Result<CacheOutcome> {
        self.cache.cache_medical_data(bundle).await
    }

    pub async fn cache_status(&self) -> Result<CacheStatus> {
        self.cache.get_status().await
    }

    pub async fn fallback_read(&self, entity_type: EntityType) -> Result<FallbackRead> {
        self.cache.fallback_read(entity_type).await
    }

    /// Run a live fetch, caching it or falling back to the snapshot offline.
    pub async fn read_through<F, Fut>(&self, entity_type: EntityType, live: F) -> Result<ReadThrough>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        self.cache
            .read_through(entity_type, self.is_online(), live)
            .await
    }

    pub async fn clear_cache(&self) -> Result<bool> {
        self.cache.clear().await
    }

    /// Persist a deferred mutating request; returns once it is durable.
    pub async fn enqueue_action(&self, action: NewAction) -> Result<PendingAction> {
        self.queue.enqueue(action).await
    }

    pub async fn pending_count(&self) -> Result<u64> {
        self.queue.count().await
    }

    /// Unresolved entries in one status; in-flight entries belong to a running session.
    pub async fn count_by_status(&self, status: ActionStatus) -> Result<u64> {
        self.queue.count_by_status(status).await
    }

    pub async fn pending_actions(&self) -> Result<Vec<PendingAction>> {
        self.queue.list().await
    }

    /// Start a manual session.
    pub fn start_sync(&self) -> SyncStart {
        self.coordinator.start_sync(SyncTrigger::Manual)
    }

    pub fn stop_sync(&self) -> bool {
        self.coordinator.stop_sync()
    }

    pub fn sync_state(&self) -> SyncState {
        self.coordinator.state()
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.coordinator.last_report()
    }

    pub fn subscribe_connectivity<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectivityEvent) + Send + Sync + 'static,
    {
        self.connectivity.subscribe(handler)
    }

    pub fn subscribe_sync_completed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SyncReport) + Send + Sync + 'static,
    {
        self.coordinator.subscribe_completed(handler)
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
