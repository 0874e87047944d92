// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reachability tracking.
//!
//! [`ConnectivityMonitor`] owns the online flag. Platform signals are fed in
//! through [`ConnectivityMonitor::set_online`] and
//! [`ConnectivityMonitor::notify_resumed`]; the optional watcher task feeds
//! both from periodic TCP probes.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{EventBus, Subscription};

/// Online flag plus the time of the last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    pub changed_at: DateTime<Utc>,
}

/// Event published by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The online flag flipped.
    Changed { online: bool, at: DateTime<Utc> },
    /// The host came back to the foreground while online; a reconciliation hint.
    Resumed { at: DateTime<Utc> },
}

impl ConnectivityEvent {
    /// True for a transition to online.
    pub fn is_restored(&self) -> bool {
        matches!(self, ConnectivityEvent::Changed { online: true, .. })
    }
}

/// Tracks reachability and publishes transitions.
pub struct ConnectivityMonitor {
    state: Mutex<ConnectivityState>,
    events: EventBus<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        ConnectivityMonitor {
            state: Mutex::new(ConnectivityState {
                online,
                changed_at: Utc::now(),
            }),
            events: EventBus::new(),
        }
    }

    fn current(&self) -> ConnectivityState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.current().online
    }

    pub fn state(&self) -> ConnectivityState {
        self.current()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectivityEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Feed a platform online/offline signal. Returns whether the flag flipped.
    ///
    /// Repeating the current value is a no-op and publishes nothing.
    pub fn set_online(&self, online: bool) -> bool {
        let event = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if state.online == online {
                return false;
            }
            let at = Utc::now();
            state.online = online;
            state.changed_at = at;
            ConnectivityEvent::Changed { online, at }
        };

        if online {
            tracing::info!("connectivity restored");
        } else {
            tracing::info!("connectivity lost");
        }
        self.events.publish(&event);
        true
    }

    /// Feed a foreground-resume signal. Publishes [`ConnectivityEvent::Resumed`]
    /// only while online; returns whether it did.
    pub fn notify_resumed(&self) -> bool {
        if !self.is_online() {
            tracing::debug!("resume ignored while offline");
            return false;
        }
        self.events
            .publish(&ConnectivityEvent::Resumed { at: Utc::now() });
        true
    }
}

/// Future returned by [`ReachabilityProbe::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// A check of whether the backend is reachable.
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self) -> ProbeFuture<'_>;
}

/// Probe that opens a TCP connection to `addr`.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            addr: addr.into(),
            timeout,
        }
    }
}

impl ReachabilityProbe for TcpProbe {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.addr))
                .await
            {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    tracing::debug!("probe {} failed: {}", self.addr, e);
                    false
                }
                Err(_) => {
                    tracing::debug!("probe {} timed out", self.addr);
                    false
                }
            }
        })
    }
}

/// How late a tick must be, in intervals, to count as a host resume.
const RESUME_LATENESS_FACTOR: u32 = 3;

/// Poll `probe` every `interval` and feed the result into `monitor`.
///
/// A tick arriving more than three intervals late (the host was suspended)
/// also signals a resume. Runs until `cancel` fires.
pub fn spawn_watcher(
    monitor: Arc<ConnectivityMonitor>,
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let late_after = interval
            .checked_mul(RESUME_LATENESS_FACTOR)
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or(chrono::Duration::MAX);
        let mut last_tick = Utc::now();

        loop {
            let online = probe.probe().await;
            let now = Utc::now();
            let resumed = now - last_tick > late_after;
            last_tick = now;

            let flipped = monitor.set_online(online);
            if resumed && !flipped {
                tracing::debug!("watcher tick was late; treating as resume");
                monitor.notify_resumed();
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::debug!("connectivity watcher stopped");
    })
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
