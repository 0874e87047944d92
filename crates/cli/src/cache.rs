// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Last-known-good snapshot cache held by the background agent.
//!
//! Every read served from here is labelled stale. An inactive or
//! unreachable agent is reported as such, never as an empty cache.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ck_ipc::{CacheCounts, EntityBundle, EntityType};
use serde_json::Value;

use crate::bridge::{AgentBridge, AgentChannel, SocketChannel};
use crate::error::{Error, Result};

/// Result of [`ReadCache::cache_medical_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    Cached { entity_types: Vec<EntityType> },
    /// No agent is active; nothing was written.
    NotCached,
}

/// Result of [`ReadCache::get_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Available(CacheCounts),
    Unavailable,
}

/// Cached records served in place of a live fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleSnapshot {
    pub entity_type: EntityType,
    pub records: Vec<Value>,
    pub cached_at: DateTime<Utc>,
    pub age: chrono::Duration,
}

impl StaleSnapshot {
    /// Age in whole minutes, clamped at zero.
    pub fn age_minutes(&self) -> i64 {
        self.age.num_minutes().max(0)
    }
}

/// Result of [`ReadCache::fallback_read`].
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackRead {
    Stale(StaleSnapshot),
    /// The agent has no snapshot for this entity type.
    Missing,
    Unavailable,
}

/// Result of [`ReadCache::read_through`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReadThrough {
    Fresh(Vec<Value>),
    Fallback(FallbackRead),
}

fn is_unreachable(e: &Error) -> bool {
    matches!(e, Error::AgentUnavailable | Error::AgentTimeout(_))
}

/// Snapshot cache backed by the agent.
pub struct ReadCache<C: AgentChannel = SocketChannel> {
    bridge: Arc<AgentBridge<C>>,
}

impl<C: AgentChannel> ReadCache<C> {
    pub fn new(bridge: Arc<AgentBridge<C>>) -> Self {
        ReadCache { bridge }
    }

    /// Replace the cached snapshots of every entity type in `bundle`.
    pub async fn cache_medical_data(&self, bundle: EntityBundle) -> Result<CacheOutcome> {
        if !self.bridge.is_active() {
            tracing::debug!("agent inactive; snapshot not cached");
            return Ok(CacheOutcome::NotCached);
        }

        let entity_types = bundle.entity_types();
        match self.bridge.cache_write(bundle).await {
            Ok(true) => {
                tracing::debug!("cached {:?}", entity_types);
                Ok(CacheOutcome::Cached { entity_types })
            }
            Ok(false) => Err(Error::AgentProtocol("agent refused cache write".to_string())),
            Err(Error::AgentUnavailable) => Ok(CacheOutcome::NotCached),
            Err(e) => Err(e),
        }
    }

    /// Record counts per cached entity type.
    pub async fn get_status(&self) -> Result<CacheStatus> {
        if !self.bridge.is_active() {
            return Ok(CacheStatus::Unavailable);
        }
        match self.bridge.cache_status().await {
            Ok(counts) => Ok(CacheStatus::Available(counts)),
            Err(e) if is_unreachable(&e) => Ok(CacheStatus::Unavailable),
            Err(e) => Err(e),
        }
    }

    /// Last cached snapshot for `entity_type`, labelled stale.
    pub async fn fallback_read(&self, entity_type: EntityType) -> Result<FallbackRead> {
        if !self.bridge.is_active() {
            return Ok(FallbackRead::Unavailable);
        }
        match self.bridge.cache_read(entity_type).await {
            Ok(Some(set)) => {
                let age = Utc::now() - set.updated_at;
                tracing::debug!(%entity_type, "serving stale snapshot ({} min old)", age.num_minutes());
                Ok(FallbackRead::Stale(StaleSnapshot {
                    entity_type,
                    records: set.records,
                    cached_at: set.updated_at,
                    age,
                }))
            }
            Ok(None) => Ok(FallbackRead::Missing),
            Err(e) if is_unreachable(&e) => Ok(FallbackRead::Unavailable),
            Err(e) => Err(e),
        }
    }

    /// Run `live`; cache its result, or fall back to the snapshot when offline.
    ///
    /// A failed live fetch while online is returned as is.
    pub async fn read_through<F, Fut>(
        &self,
        entity_type: EntityType,
        online: bool,
        live: F,
    ) -> Result<ReadThrough>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        match live().await {
            Ok(records) => {
                let bundle = EntityBundle::new().with(entity_type, records.clone());
                if let Err(e) = self.cache_medical_data(bundle).await {
                    tracing::warn!(%entity_type, "write-through failed: {}", e);
                }
                Ok(ReadThrough::Fresh(records))
            }
            Err(e) if !online => {
                tracing::debug!(%entity_type, "live fetch failed offline: {}", e);
                Ok(ReadThrough::Fallback(self.fallback_read(entity_type).await?))
            }
            Err(e) => Err(e),
        }
    }

    /// Drop every cached snapshot. Returns `false` when no agent is active.
    pub async fn clear(&self) -> Result<bool> {
        if !self.bridge.is_active() {
            return Ok(false);
        }
        self.bridge.cache_clear().await
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
