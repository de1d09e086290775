//! Integration Tests for Reactive System
//!
//! These tests verify that observables, effects, and computed values work
//! together correctly.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use ripple_core::reactive::{EffectOptions, Object, ReactiveContext, Runtime, Value};
use ripple_core::RuntimeConfig;

/// Wrapping the same object, or an observable, always yields one wrapper.
#[test]
fn wrapping_is_idempotent() {
    let runtime = Runtime::new();
    let raw = Object::from(json!({ "a": 1 }));

    let first = runtime.reactive(&raw);
    assert_eq!(first, runtime.reactive(&raw));
    assert_eq!(first, runtime.reactive(&first));
    assert_eq!(runtime.observable_count(), 1);
}

/// Nested reads inside an effect reuse one wrapper per object.
#[test]
fn repeated_nested_reads_do_not_grow_the_runtime() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::from(json!({ "b": { "title": "tom" } })));

    let watched = state.clone();
    let effect = runtime.effect(move || {
        let first = watched.get_object("b").unwrap();
        let second = watched.get_object("b").unwrap();
        assert_eq!(first, second);
        first.get("title")
    });

    for i in 0..500 {
        state.get_object("b").unwrap().set("title", i);
    }

    assert_eq!(effect.run_count(), 501);
    assert_eq!(runtime.observable_count(), 2);
    assert_eq!(runtime.prune(), 0);
}

/// Each write to a read field re-runs the effect exactly once.
#[test]
fn read_tracks_write_triggers() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("a", 1));
    let observed = Arc::new(AtomicI32::new(-1));
    let runs = Arc::new(AtomicUsize::new(0));

    let (watched, observed_clone, runs_clone) = (state.clone(), observed.clone(), runs.clone());
    let _effect = runtime.effect(move || {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        let value = watched.get_f64("a").unwrap_or(-1.0);
        observed_clone.store(value as i32, Ordering::SeqCst);
    });

    assert_eq!(observed.load(Ordering::SeqCst), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    state.set("a", 2);
    assert_eq!(observed.load(Ordering::SeqCst), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    // Writing an unread field does nothing.
    state.set("b", 3);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Reads made outside a computation create no subscriptions.
#[test]
fn no_tracking_outside_a_computation() {
    let runtime = Runtime::new();
    let raw = Object::new().with("a", 1);
    let state = runtime.reactive(&raw);

    assert_eq!(state.get("a"), Value::Number(1.0));
    assert_eq!(runtime.subscriber_count(&raw, "a"), 0);
    assert_eq!(runtime.tracked_target_count(), 0);

    state.set("a", 2);
    assert_eq!(runtime.tracked_target_count(), 0);
}

/// The full chain of the classic demo: nested object, nested write.
#[test]
fn nested_title_write_reaches_title_subscribers() {
    let runtime = Runtime::new();
    let raw = Object::from(json!({ "a": "a", "b": { "title": "tom" } }));
    let state = runtime.reactive(&raw);
    let titles = Arc::new(Mutex::new(Vec::new()));

    let (watched, log) = (state.clone(), titles.clone());
    let _effect = runtime.effect(move || {
        let b = watched.get("b");
        let title = b
            .as_observable()
            .and_then(|b| b.get_str("title").ok())
            .unwrap_or_default();
        log.lock().push(title);
    });

    let b = state.get("b");
    let nested = b.as_observable().expect("nested object is wrapped");
    nested.set("title", "rrr");

    assert_eq!(*titles.lock(), vec!["tom".to_string(), "rrr".to_string()]);
    assert_eq!(
        serde_json::to_value(&raw).unwrap(),
        json!({ "a": "a", "b": { "title": "rrr" } })
    );
}

/// Plain effects finish before computed values re-evaluate.
#[test]
fn plain_effects_run_before_computed() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("a", 1));
    let log = Arc::new(Mutex::new(Vec::new()));

    // Subscribed first, so insertion order alone would run it first.
    let (watched, events) = (state.clone(), log.clone());
    let derived = runtime.computed(move || {
        events.lock().push("derived");
        watched.get("a")
    });
    derived.value();

    let (watched, events) = (state.clone(), log.clone());
    let _plain = runtime.effect(move || {
        events.lock().push("plain:start");
        watched.get("a");
        events.lock().push("plain:end");
    });

    log.lock().clear();
    state.set("a", 2);
    assert_eq!(*log.lock(), vec!["plain:start", "plain:end", "derived"]);
}

/// An effect that writes what it reads does not recurse into itself.
#[test]
fn re_entrant_write_is_suppressed() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("count", 0));

    let watched = state.clone();
    let effect = runtime.effect(move || {
        let count = watched.get_f64("count").unwrap_or_default();
        watched.set("count", count + 1.0);
    });

    assert_eq!(effect.run_count(), 1);
    assert_eq!(state.get_f64("count").unwrap(), 1.0);
    assert_eq!(ReactiveContext::depth(), 0);
}

/// A transitive cycle between two effects terminates.
#[test]
fn mutual_triggers_terminate() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("ping", 0).with("pong", 0));

    let watched = state.clone();
    let ping = runtime.effect(move || {
        let n = watched.get_f64("ping").unwrap_or_default();
        watched.set("pong", n + 1.0);
    });
    let watched = state.clone();
    let pong = runtime.effect(move || {
        let n = watched.get_f64("pong").unwrap_or_default();
        watched.set("ping", n + 1.0);
    });

    state.set("ping", 10);
    assert!(ping.run_count() >= 2);
    assert!(pong.run_count() >= 2);
    assert_eq!(ReactiveContext::depth(), 0);
}

/// A panicking effect leaves the stack empty and the system usable.
#[test]
fn panicking_effect_restores_stack() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("fail", false));

    let watched = state.clone();
    let effect = runtime.effect(move || {
        if watched.get_bool("fail").unwrap_or(false) {
            panic!("effect failed");
        }
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| state.set("fail", true)));
    assert!(result.is_err());
    assert_eq!(ReactiveContext::depth(), 0);

    state.set("fail", false);
    assert_eq!(effect.run_count(), 3);
}

/// Computed values are lazy and re-evaluate on every read.
#[test]
fn computed_is_lazy_and_fresh() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("count", 1));
    let evaluations = Arc::new(AtomicUsize::new(0));

    let (watched, counter) = (state.clone(), evaluations.clone());
    let doubled = runtime.computed(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        watched.get_f64("count").unwrap_or_default() * 2.0
    });
    assert_eq!(evaluations.load(Ordering::SeqCst), 0);

    assert_eq!(doubled.value(), Some(2.0));
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    state.set("count", 4);
    // The write re-ran the computed value once as a subscriber.
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);

    assert_eq!(doubled.value(), Some(8.0));
    assert_eq!(evaluations.load(Ordering::SeqCst), 3);
}

/// Without cleanup, a branch that is no longer read keeps triggering.
#[test]
fn stale_dependencies_accumulate_by_default() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("flag", true).with("a", 1).with("b", 2));

    let watched = state.clone();
    let effect = runtime.effect(move || {
        if watched.get_bool("flag").unwrap_or(false) {
            watched.get("a")
        } else {
            watched.get("b")
        }
    });

    state.set("flag", false);
    assert_eq!(effect.run_count(), 2);

    state.set("a", 10);
    assert_eq!(effect.run_count(), 3);
}

/// With cleanup enabled, dependencies follow the latest run.
#[test]
fn cleanup_drops_stale_dependencies() {
    let runtime = Runtime::with_config(RuntimeConfig::default().with_cleanup(true));
    let raw = Object::new().with("flag", true).with("a", 1).with("b", 2);
    let state = runtime.reactive(&raw);

    let watched = state.clone();
    let effect = runtime.effect(move || {
        if watched.get_bool("flag").unwrap_or(false) {
            watched.get("a")
        } else {
            watched.get("b")
        }
    });
    assert_eq!(runtime.subscriber_count(&raw, "a"), 1);

    state.set("flag", false);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(runtime.subscriber_count(&raw, "a"), 0);
    assert_eq!(runtime.subscriber_count(&raw, "b"), 1);
    assert_eq!(effect.dependency_count(), 2);

    state.set("a", 10);
    assert_eq!(effect.run_count(), 2);

    state.set("b", 20);
    assert_eq!(effect.run_count(), 3);
}

/// Runtimes never see each other's subscriptions.
#[test]
fn runtimes_are_isolated() {
    let (first, second) = (Runtime::new(), Runtime::new());
    let raw = Object::new().with("a", 1);
    let in_first = first.reactive(&raw);
    let in_second = second.reactive(&raw);

    let watched = in_first.clone();
    let effect = first.effect(move || watched.get("a"));

    in_second.set("a", 2);
    assert_eq!(effect.run_count(), 1);

    in_first.set("a", 3);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(second.tracked_target_count(), 0);
}

/// Arguments reach explicitly invoked computations.
#[test]
fn lazy_effect_with_arguments() {
    let runtime = Runtime::new();
    let state = runtime.reactive(Object::new().with("base", 10));

    let watched = state.clone();
    let add = runtime.effect_with_args(
        move |args: &[Value]| {
            let base = watched.get_f64("base").unwrap_or_default();
            base + args.first().and_then(Value::as_f64).unwrap_or_default()
        },
        EffectOptions::default().with_lazy(true),
    );

    assert_eq!(add.run_count(), 0);
    assert_eq!(add.invoke_with(&[Value::from(5)]), Some(15.0));

    // Runs caused by writes receive no arguments.
    state.set("base", 20);
    assert_eq!(add.run_count(), 2);
    assert_eq!(add.invoke_with(&[Value::from(1)]), Some(21.0));
}

/// Configuration can be loaded from JSON.
#[test]
fn runtime_from_json_config() {
    let config = RuntimeConfig::from_json(r#"{ "name": "store", "cleanup_stale_dependencies": true }"#)
        .unwrap();
    let runtime = Runtime::with_config(config);

    assert_eq!(runtime.config().name.as_deref(), Some("store"));
    assert!(runtime.config().cleanup_stale_dependencies);
}
