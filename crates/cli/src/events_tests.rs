// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move |_: &u32| {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn publish_reaches_all_listeners() {
    let bus = EventBus::<u32>::new();
    let (a, fa) = counter();
    let (b, fb) = counter();
    let _sa = bus.subscribe(fa);
    let _sb = bus.subscribe(fb);

    assert_eq!(bus.publish(&7), 2);
    assert_eq!(a.load(Ordering::SeqCst), 1);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_subscription_unsubscribes() {
    let bus = EventBus::<u32>::new();
    let (count, f) = counter();
    let sub = bus.subscribe(f);
    assert_eq!(bus.listener_count(), 1);

    drop(sub);
    bus.publish(&1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn explicit_unsubscribe() {
    let bus = EventBus::<u32>::new();
    let (count, f) = counter();
    bus.subscribe(f).unsubscribe();
    bus.publish(&1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn detached_listener_stays() {
    let bus = EventBus::<u32>::new();
    let (count, f) = counter();
    bus.subscribe(f).detach();
    bus.publish(&1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn panicking_listener_does_not_break_others() {
    let bus = EventBus::<u32>::new();
    let _bad = bus.subscribe(|_| panic!("faulty subscriber"));
    let (count, f) = counter();
    let _good = bus.subscribe(f);

    assert_eq!(bus.publish(&3), 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    // The bus is still usable afterwards.
    assert_eq!(bus.publish(&4), 1);
}

#[test]
fn listener_can_unsubscribe_during_publish() {
    let bus = EventBus::<u32>::new();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let inner = Arc::clone(&slot);
    let sub = bus.subscribe(move |_| {
        inner.lock().unwrap().take();
    });
    *slot.lock().unwrap() = Some(sub);

    bus.publish(&1);
    assert_eq!(bus.listener_count(), 0);
}

#[test]
fn subscription_outliving_bus_is_harmless() {
    let bus = EventBus::<u32>::new();
    let (_, f) = counter();
    let sub = bus.subscribe(f);
    drop(bus);
    drop(sub);
}
