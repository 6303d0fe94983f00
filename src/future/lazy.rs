//! The recomputing future.

use crate::error::{Error, ErrorKind};
use crate::executor::{Executor, Job};
use crate::future::{Consumer, Producer, Promised, SharedConsumer, block_on, run_user_task};
use crate::outcome::Outcome;
use crate::time::Scheduler;
use crate::tracing_compat::warn;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A future that stores no result: every subscription re-invokes its
/// producer.
///
/// This makes composition free until somebody subscribes — a chain of
/// transforms is just a chain of wrapped producers — and it means
/// concurrent subscribers to a non-deterministic computation may see
/// different outcomes. Use [`materialize`](Self::materialize) when one
/// shared evaluation is wanted.
///
/// Because producers are re-invocable, transform closures here are `Fn`
/// rather than the eager future's `FnOnce`.
pub struct LazyFuture<T> {
    producer: Arc<dyn Producer<T>>,
    executor: Option<Arc<dyn Executor>>,
}

impl<T: Send + 'static> LazyFuture<T> {
    // ── Construction ────────────────────────────────────────────────

    /// Wraps a producer; nothing runs until the first `consume`.
    #[must_use]
    pub fn build(producer: impl Producer<T> + 'static) -> Self {
        Self {
            producer: Arc::new(producer),
            executor: None,
        }
    }

    /// A future that delivers a clone of `value` to every subscriber.
    #[must_use]
    pub fn from_value(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::build(move |consumer: Consumer<T>| {
            consumer(Outcome::Success(value.clone()));
        })
    }

    /// A future that delivers `error` to every subscriber.
    #[must_use]
    pub fn from_error(error: Error) -> Self {
        Self::build(move |consumer: Consumer<T>| {
            consumer(Outcome::Failure(error.clone()));
        })
    }

    /// A future that runs `supplier` on the consuming thread, once per
    /// subscription.
    #[must_use]
    pub fn apply<F>(supplier: F) -> Self
    where
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        Self::build(move |consumer: Consumer<T>| {
            consumer(run_user_task(|| supplier()));
        })
    }

    /// A future that submits `task` to `executor` once per subscription.
    ///
    /// A subscription made after the pool shut down fails with
    /// [`ErrorKind::Rejected`].
    #[must_use]
    pub fn submit<F>(executor: &Arc<dyn Executor>, task: F) -> Self
    where
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        Self::submit_inner(executor, task, false)
    }

    /// Like [`submit`](Self::submit), but consumptions of the resulting
    /// future are themselves dispatched through the executor.
    #[must_use]
    pub fn submit_delegating<F>(executor: &Arc<dyn Executor>, task: F) -> Self
    where
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        Self::submit_inner(executor, task, true)
    }

    fn submit_inner<F>(executor: &Arc<dyn Executor>, task: F, delegating: bool) -> Self
    where
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        let pool = Arc::clone(executor);
        let task = Arc::new(task);
        let mut future = Self::build(move |consumer: Consumer<T>| {
            let task = Arc::clone(&task);
            let shared = SharedConsumer::new(consumer);
            let reclaim = shared.clone();
            let job: Job = Box::new(move || {
                shared.deliver(run_user_task(|| task()));
            });
            if pool.try_execute(job).is_err() {
                reclaim.deliver(Outcome::Failure(
                    Error::new(ErrorKind::Rejected).with_message("worker pool refused the task"),
                ));
            }
        });
        if delegating {
            future.executor = Some(Arc::clone(executor));
        }
        future
    }

    /// A future that schedules `task` with `delay` once per subscription.
    #[must_use]
    pub fn schedule<F>(scheduler: &Arc<dyn Scheduler>, delay: Duration, task: F) -> Self
    where
        F: Fn() -> crate::Result<T> + Send + Sync + 'static,
    {
        let scheduler = Arc::clone(scheduler);
        let task = Arc::new(task);
        Self::build(move |consumer: Consumer<T>| {
            let task = Arc::clone(&task);
            let shared = SharedConsumer::new(consumer);
            let reclaim = shared.clone();
            let token = scheduler.schedule(
                delay,
                Box::new(move || {
                    shared.deliver(run_user_task(|| task()));
                }),
            );
            if token.was_refused() {
                reclaim.deliver(Outcome::Failure(
                    Error::new(ErrorKind::Rejected).with_message("scheduler refused the task"),
                ));
            }
        })
    }

    // ── Transformation ──────────────────────────────────────────────
    //
    // Each transform wraps the producer, so the whole chain re-runs per
    // subscription. A panic inside the user function becomes that
    // subscription's failure.

    /// Transforms the success value; failures pass through.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> LazyFuture<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        LazyFuture::build(move |consumer: Consumer<U>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| match outcome {
                Outcome::Success(value) => {
                    match catch_unwind(AssertUnwindSafe(move || f(value))) {
                        Ok(mapped) => consumer(Outcome::Success(mapped)),
                        Err(payload) => {
                            consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                        }
                    }
                }
                Outcome::Failure(error) => consumer(Outcome::Failure(error)),
            }));
        })
    }

    /// Chains a future-returning continuation onto the success value;
    /// failures pass through.
    #[must_use]
    pub fn flat_map<U, R, F>(&self, f: F) -> LazyFuture<U>
    where
        U: Send + 'static,
        R: Promised<U>,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        LazyFuture::build(move |consumer: Consumer<U>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| match outcome {
                Outcome::Success(value) => {
                    match catch_unwind(AssertUnwindSafe(move || f(value))) {
                        Ok(next) => next.consume(consumer),
                        Err(payload) => {
                            consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                        }
                    }
                }
                Outcome::Failure(error) => consumer(Outcome::Failure(error)),
            }));
        })
    }

    /// Turns a failure back into a value; successes pass through.
    #[must_use]
    pub fn recover<F>(&self, f: F) -> Self
    where
        F: Fn(Error) -> T + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        Self::build(move |consumer: Consumer<T>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| match outcome {
                Outcome::Success(value) => consumer(Outcome::Success(value)),
                Outcome::Failure(err) => match catch_unwind(AssertUnwindSafe(move || f(err))) {
                    Ok(value) => consumer(Outcome::Success(value)),
                    Err(payload) => {
                        consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                },
            }));
        })
    }

    /// Turns a failure into a fresh future; successes pass through.
    #[must_use]
    pub fn recover_with<R, F>(&self, f: F) -> Self
    where
        R: Promised<T>,
        F: Fn(Error) -> R + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        Self::build(move |consumer: Consumer<T>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| match outcome {
                Outcome::Success(value) => consumer(Outcome::Success(value)),
                Outcome::Failure(err) => match catch_unwind(AssertUnwindSafe(move || f(err))) {
                    Ok(next) => next.consume(consumer),
                    Err(payload) => {
                        consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                },
            }));
        })
    }

    /// Continues with a handler that sees the outcome, success or
    /// failure, and produces a value.
    #[must_use]
    pub fn always<U, F>(&self, f: F) -> LazyFuture<U>
    where
        U: Send + 'static,
        F: Fn(Outcome<T>) -> U + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        LazyFuture::build(move |consumer: Consumer<U>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| {
                match catch_unwind(AssertUnwindSafe(move || f(outcome))) {
                    Ok(value) => consumer(Outcome::Success(value)),
                    Err(payload) => {
                        consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                }
            }));
        })
    }

    /// Continues with a handler that sees the outcome and produces a
    /// fresh future.
    #[must_use]
    pub fn always_with<U, R, F>(&self, f: F) -> LazyFuture<U>
    where
        U: Send + 'static,
        R: Promised<U>,
        F: Fn(Outcome<T>) -> R + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        LazyFuture::build(move |consumer: Consumer<U>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| {
                match catch_unwind(AssertUnwindSafe(move || f(outcome))) {
                    Ok(next) => next.consume(consumer),
                    Err(payload) => {
                        consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                }
            }));
        })
    }

    /// Side-effecting peek at each delivered outcome; the outcome passes
    /// through unchanged unless the peek panics.
    #[must_use]
    pub fn and_then<F>(&self, f: F) -> Self
    where
        F: Fn(&Outcome<T>) + Send + Sync + 'static,
    {
        let outer = self.clone();
        let f = Arc::new(f);
        Self::build(move |consumer: Consumer<T>| {
            let f = Arc::clone(&f);
            outer.consume(Box::new(move |outcome| {
                match catch_unwind(AssertUnwindSafe(|| f(&outcome))) {
                    Ok(()) => consumer(outcome),
                    Err(payload) => {
                        consumer(Outcome::Failure(Error::panicked(payload.as_ref())));
                    }
                }
            }));
        })
    }

    // ── Consumption ─────────────────────────────────────────────────

    /// Triggers one fresh execution of the producer for this consumer.
    pub fn consume(&self, consumer: Consumer<T>) {
        match &self.executor {
            Some(executor) => {
                let producer = Arc::clone(&self.producer);
                let job: Job = Box::new(move || producer.produce(consumer));
                if let Err(job) = executor.try_execute(job) {
                    warn!("dispatch executor rejected a lazy consumption; running inline");
                    job();
                }
            }
            None => self.producer.produce(consumer),
        }
    }

    /// Blocks on one fresh consumption.
    ///
    /// # Errors
    ///
    /// Returns whatever failure this consumption produced.
    pub fn get(&self) -> crate::Result<T> {
        block_on(self, None)
    }

    /// Blocks on one fresh consumption, up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns this consumption's failure, or a timeout error when
    /// nothing arrived in time.
    pub fn get_timeout(&self, timeout: Duration) -> crate::Result<T> {
        block_on(self, Some(timeout))
    }

    /// Forces single evaluation and sharing: runs the producer once, now,
    /// into a memoizing future.
    #[must_use]
    pub fn materialize(&self) -> super::EagerFuture<T>
    where
        T: Clone + Sync,
    {
        super::EagerFuture::build_with_executor(
            Arc::clone(&self.producer),
            self.executor.clone(),
        )
    }

    // ── Timing ──────────────────────────────────────────────────────

    /// Races each consumption against a deadline scheduled at
    /// consumption time.
    ///
    /// The losing side is not interrupted; a late result is discarded.
    #[must_use]
    pub fn with_timeout(&self, scheduler: &Arc<dyn Scheduler>, duration: Duration) -> Self {
        let scheduler = Arc::clone(scheduler);
        let deadline = Self::build(move |consumer: Consumer<T>| {
            let error = Error::timeout("unnamed task", duration);
            drop(scheduler.schedule(
                duration,
                Box::new(move || consumer(Outcome::Failure(error))),
            ));
        });
        Self::collect_first(vec![self.clone(), deadline])
    }

    /// Re-consumes this future a second time if the first consumption
    /// has not delivered within `delay`; the first delivery wins.
    ///
    /// Both consumptions may run to completion; the loser's side effects
    /// are not undone, so the underlying computation must be idempotent.
    #[must_use]
    pub fn double_dispatch(&self, scheduler: &Arc<dyn Scheduler>, delay: Duration) -> Self {
        let outer = self.clone();
        let scheduler = Arc::clone(scheduler);
        Self::build(move |consumer: Consumer<T>| {
            let done = Arc::new(AtomicBool::new(false));
            let shared = SharedConsumer::new(consumer);
            {
                let done = Arc::clone(&done);
                let shared = shared.clone();
                outer.consume(Box::new(move |outcome| {
                    done.store(true, Ordering::Release);
                    shared.deliver(outcome);
                }));
            }
            let second = outer.clone();
            drop(scheduler.schedule(
                delay,
                Box::new(move || {
                    if !done.load(Ordering::Acquire) {
                        second.consume(Box::new(move |outcome| shared.deliver(outcome)));
                    }
                }),
            ));
        })
    }

    /// Races a set of lazy futures inside one lazy wrapper; consumption
    /// subscribes to all of them and keeps the first delivery.
    pub(crate) fn collect_first(futures: Vec<Self>) -> Self {
        Self::build(move |consumer: Consumer<T>| {
            let shared = SharedConsumer::new(consumer);
            for future in &futures {
                let shared = shared.clone();
                future.consume(Box::new(move |outcome| shared.deliver(outcome)));
            }
        })
    }
}

impl<T> Clone for LazyFuture<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            executor: self.executor.clone(),
        }
    }
}

impl<T: Send + 'static> Promised<T> for LazyFuture<T> {
    fn consume(&self, consumer: Consumer<T>) {
        Self::consume(self, consumer);
    }
}

impl<T> fmt::Debug for LazyFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFuture")
            .field("delegating", &self.executor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// A producer whose value changes every invocation.
    fn counting_future() -> (LazyFuture<u32>, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let probe = Arc::clone(&runs);
        let future = LazyFuture::build(move |consumer: Consumer<u32>| {
            consumer(Outcome::Success(probe.fetch_add(1, Ordering::SeqCst)));
        });
        (future, runs)
    }

    #[test]
    fn each_consumption_reruns_the_producer() {
        let (future, runs) = counting_future();
        assert_eq!(runs.load(Ordering::SeqCst), 0, "lazy future ran early");
        assert_eq!(future.get().unwrap(), 0);
        assert_eq!(future.get().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transforms_defer_until_consumption() {
        let (future, runs) = counting_future();
        let mapped = future.map(|v| v + 100).map(|v| v * 2);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(mapped.get().unwrap(), 200);
        assert_eq!(mapped.get().unwrap(), 202);
    }

    #[test]
    fn materialize_runs_once_and_shares() {
        let (future, runs) = counting_future();
        let shared = future.materialize();
        assert_eq!(shared.get().unwrap(), 0);
        assert_eq!(shared.get().unwrap(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn from_value_clones_per_subscriber() {
        let future = LazyFuture::from_value(vec![1, 2]);
        assert_eq!(future.get().unwrap(), vec![1, 2]);
        assert_eq!(future.get().unwrap(), vec![1, 2]);
    }

    #[test]
    fn recover_and_flat_map_wrap_the_producer() {
        let flaky: LazyFuture<i32> = LazyFuture::from_error(Error::computation("down"));
        let recovered = flaky.recover(|_| 1).flat_map(|v| LazyFuture::from_value(v + 1));
        assert_eq!(recovered.get().unwrap(), 2);
        assert_eq!(recovered.get().unwrap(), 2);
    }

    #[test]
    fn panic_in_transform_fails_that_subscription() {
        let (future, _) = counting_future();
        let bad = future.map(|_| -> u32 { panic!("mapper bug") });
        assert!(bad.get().unwrap_err().is_panic());
        // The chain still works for the next subscriber.
        assert!(bad.get().unwrap_err().is_panic());
    }

    #[test]
    fn apply_runs_on_consuming_thread() {
        let future = LazyFuture::apply(|| Ok(std::thread::current().id()));
        assert_eq!(future.get().unwrap(), std::thread::current().id());
    }
}
