// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

fn recorder(monitor: &ConnectivityMonitor) -> (Arc<Mutex<Vec<ConnectivityEvent>>>, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let sub = monitor.subscribe(move |e| sink.lock().unwrap().push(*e));
    (events, sub)
}

#[test]
fn set_online_emits_only_on_flip() {
    let monitor = ConnectivityMonitor::new(true);
    let (events, _sub) = recorder(&monitor);

    assert!(!monitor.set_online(true));
    assert!(monitor.set_online(false));
    assert!(!monitor.set_online(false));
    assert!(!monitor.set_online(false));
    assert!(monitor.set_online(true));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ConnectivityEvent::Changed { online: false, .. }));
    assert!(events[1].is_restored());
}

#[test]
fn state_tracks_last_transition() {
    let monitor = ConnectivityMonitor::new(false);
    let before = monitor.state().changed_at;
    monitor.set_online(true);
    let state = monitor.state();
    assert!(state.online);
    assert!(state.changed_at >= before);
}

#[test]
fn resume_is_a_hint_only_while_online() {
    let monitor = ConnectivityMonitor::new(false);
    let (events, _sub) = recorder(&monitor);

    assert!(!monitor.notify_resumed());
    monitor.set_online(true);
    assert!(monitor.notify_resumed());

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], ConnectivityEvent::Resumed { .. }));
}

#[test]
fn faulty_listener_is_isolated() {
    let monitor = ConnectivityMonitor::new(true);
    let _bad = monitor.subscribe(|_| panic!("listener bug"));
    let (events, _sub) = recorder(&monitor);

    assert!(monitor.set_online(false));
    assert_eq!(events.lock().unwrap().len(), 1);
    assert!(!monitor.is_online());
}

struct ScriptedProbe {
    answers: Mutex<VecDeque<bool>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    fn new(answers: &[bool]) -> Arc<Self> {
        Arc::new(ScriptedProbe {
            answers: Mutex::new(answers.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        })
    }
}

impl ReachabilityProbe for ScriptedProbe {
    fn probe(&self) -> ProbeFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.pop_front().unwrap_or(true)
            } else {
                answers.front().copied().unwrap_or(true)
            }
        };
        Box::pin(async move { answer })
    }
}

#[tokio::test]
async fn watcher_feeds_probe_results() {
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let (events, _sub) = recorder(&monitor);
    let probe = ScriptedProbe::new(&[false, false, true]);
    let cancel = CancellationToken::new();

    let handle = spawn_watcher(
        Arc::clone(&monitor),
        probe.clone(),
        Duration::from_millis(10),
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert!(probe.calls.load(Ordering::SeqCst) >= 3);
    assert!(monitor.is_online());
    let changes: Vec<bool> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            ConnectivityEvent::Changed { online, .. } => Some(*online),
            ConnectivityEvent::Resumed { .. } => None,
        })
        .collect();
    assert_eq!(changes, vec![false, true]);
}

#[tokio::test]
async fn watcher_stops_on_cancel() {
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let handle = spawn_watcher(
        monitor,
        ScriptedProbe::new(&[true]),
        Duration::from_secs(3600),
        cancel,
    );
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn watcher_accepts_an_interval_too_large_to_scale() {
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let (events, _sub) = recorder(&monitor);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let handle = spawn_watcher(
        Arc::clone(&monitor),
        ScriptedProbe::new(&[true]),
        Duration::from_secs(u64::MAX / 2),
        cancel,
    );
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(monitor.is_online());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tcp_probe_reports_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    assert!(
        TcpProbe::new(addr.to_string(), Duration::from_secs(1))
            .probe()
            .await
    );

    drop(listener);
    assert!(
        !TcpProbe::new(addr.to_string(), Duration::from_millis(500))
            .probe()
            .await
    );
}
