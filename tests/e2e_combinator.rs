//! End-to-end tests for the N-ary combinators, including the timing
//! properties around fail-fast and quorum early exit.

mod common;

use common::init_test_logging;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tandem::combinator::{all, any, combine, combine3_with, combine_with, first, first_within};
use tandem::{EagerFuture, Error, LazyFuture, Promise, Promised, TimerScheduler};

/// Three futures, one failing immediately and two never
/// completing — fail-fast `all` completes with that failure without
/// waiting.
#[test]
fn fail_fast_all_does_not_wait_for_stragglers() {
    init_test_logging();
    let never_a: Promise<i32> = Promise::new();
    let never_b: Promise<i32> = Promise::new();

    let started = Instant::now();
    let combined = all(
        true,
        vec![
            never_a.future(),
            EagerFuture::from_error(Error::computation("immediate failure")),
            never_b.future(),
        ],
    );
    let error = combined.get().unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(error.message().is_some_and(|m| m.contains("immediate")));
}

/// `first(2, false, ...)` completes as soon as two inputs
/// succeed, ignoring the still-pending third.
#[test]
fn first_two_ignores_the_pending_third() {
    init_test_logging();
    let pending: Promise<i32> = Promise::new();
    let started = Instant::now();
    let combined = first(
        vec![
            EagerFuture::from_value(1),
            pending.future(),
            EagerFuture::from_value(3),
        ],
        2,
        false,
    );
    let values = combined.get().unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(values, vec![Some(1), None, Some(3)]);
}

/// A slow input dominates a tolerant `all`, but fail-fast
/// returns long before the slow input when a sibling fails immediately.
#[test]
fn timeout_racing_through_all() {
    init_test_logging();
    let scheduler = TimerScheduler::new();

    let slow = EagerFuture::schedule(&scheduler, Duration::from_millis(300), || Ok(30));
    let started = Instant::now();
    let combined = all(
        false,
        vec![
            slow,
            EagerFuture::from_value(1),
            EagerFuture::from_value(2),
        ],
    );
    assert_eq!(combined.get().unwrap(), vec![Some(30), Some(1), Some(2)]);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(250), "finished early: {waited:?}");

    let slow = EagerFuture::schedule(&scheduler, Duration::from_millis(300), || Ok(30));
    let started = Instant::now();
    let combined = all(
        true,
        vec![
            slow,
            EagerFuture::from_error(Error::computation("fast failure")),
            EagerFuture::from_value(2),
        ],
    );
    assert!(combined.get().is_err());
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "fail-fast waited for the slow input"
    );
}

/// The deadline variant force-finishes a quorum with whatever
/// accumulated.
#[test]
fn first_within_force_finishes_at_the_deadline() {
    init_test_logging();
    let scheduler = TimerScheduler::new();
    let pending: Promise<i32> = Promise::new();
    let started = Instant::now();
    let combined = first_within(
        vec![EagerFuture::from_value(1), pending.future()],
        2,
        false,
        &scheduler,
        Duration::from_millis(50),
    );
    let values = combined.get().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(45));
    assert_eq!(values, vec![Some(1), None]);
}

/// `any` keeps the first completion from a racing pack and discards the
/// rest.
#[test]
fn any_races_producers_from_many_threads() {
    init_test_logging();
    let promises: Vec<Promise<usize>> = (0..4).map(|_| Promise::new()).collect();
    let winner = any(promises.iter().map(Promise::future).collect());

    let racers: Vec<_> = promises
        .into_iter()
        .enumerate()
        .map(|(index, promise)| {
            std::thread::spawn(move || {
                promise.set(index);
            })
        })
        .collect();
    for racer in racers {
        racer.join().expect("racer thread");
    }

    let value = winner.get().unwrap();
    assert!(value < 4);
    // Replay returns the same winner.
    assert_eq!(winner.get().unwrap(), value);
}

/// Combined futures assemble positional values whichever order inputs
/// complete in.
#[test]
fn combine_is_index_stable_not_completion_ordered() {
    init_test_logging();
    let left: Promise<String> = Promise::new();
    let right: Promise<u32> = Promise::new();
    let combined = combine(left.future(), right.future(), |name, count| {
        format!("{name}:{count}")
    });

    // Right completes first; positions still hold.
    right.set(9);
    left.set("replicas".to_string());
    assert_eq!(combined.get().unwrap(), "replicas:9");
}

/// The flat variants chain into futures, mixing variants freely.
#[test]
fn combine_with_flattens_and_mixes_variants() {
    init_test_logging();
    let combined = combine_with(
        LazyFuture::from_value(6),
        EagerFuture::from_value(7),
        |a, b| LazyFuture::from_value(a * b),
    );
    assert_eq!(combined.get().unwrap(), 42);

    let combined = combine3_with(
        EagerFuture::from_value(1),
        EagerFuture::from_value(2),
        LazyFuture::from_value(3),
        |a, b, c| EagerFuture::from_value(a + b + c),
    );
    assert_eq!(combined.get().unwrap(), 6);
}

/// Combinators accept boxed trait objects, so callers can mix variants
/// in one input list.
#[test]
fn boxed_heterogeneous_inputs() {
    init_test_logging();
    let inputs: Vec<Box<dyn Promised<i32>>> = vec![
        Box::new(EagerFuture::from_value(1)),
        Box::new(LazyFuture::from_value(2)),
        Box::new(EagerFuture::from_value(3)),
    ];
    let combined = all(true, inputs);
    assert_eq!(combined.get().unwrap(), vec![Some(1), Some(2), Some(3)]);
}

/// Every input consumer runs exactly once even when inputs complete
/// concurrently with each other.
#[test]
fn concurrent_input_completions_are_counted_once() {
    init_test_logging();
    for _ in 0..8 {
        let promises: Vec<Promise<usize>> = (0..8).map(|_| Promise::new()).collect();
        let combined = all(false, promises.iter().map(Promise::future).collect());

        let completions = Arc::new(AtomicU32::new(0));
        let workers: Vec<_> = promises
            .into_iter()
            .enumerate()
            .map(|(index, promise)| {
                let completions = Arc::clone(&completions);
                std::thread::spawn(move || {
                    promise.set(index);
                    completions.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread");
        }

        let values = combined.get().unwrap();
        assert_eq!(completions.load(Ordering::SeqCst), 8);
        assert_eq!(values.len(), 8);
        for (index, value) in values.into_iter().enumerate() {
            assert_eq!(value, Some(index));
        }
    }
}
