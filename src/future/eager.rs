//! The memoizing future and its writable promise.

use crate::error::{Error, ErrorKind};
use crate::executor::{Executor, Job};
use crate::future::{Consumer, Producer, Promised, block_on, run_user_task};
use crate::outcome::Outcome;
use crate::sync::{CallbackList, CompletionSlot};
use crate::time::Scheduler;
use crate::tracing_compat::error;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

struct Inner<T> {
    slot: CompletionSlot<Outcome<T>>,
    callbacks: CallbackList,
    executor: Option<Arc<dyn Executor>>,
}

impl<T> Inner<T> {
    fn new(executor: Option<Arc<dyn Executor>>) -> Arc<Self> {
        Arc::new(Self {
            slot: CompletionSlot::new(),
            callbacks: CallbackList::new(),
            executor,
        })
    }
}

/// The writable counterpart of an [`EagerFuture`].
///
/// A promise is completed at most once; the first `set`/`fail`/`complete`
/// wins and every later attempt is a no-op. Completion atomically drains
/// the future's pending callbacks.
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Promise<T> {
    /// Creates an unfulfilled promise whose callbacks run on the
    /// completing thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Inner::new(None),
        }
    }

    /// Creates an unfulfilled promise whose callbacks are dispatched
    /// through `executor`.
    #[must_use]
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self {
            inner: Inner::new(Some(executor)),
        }
    }

    pub(crate) fn with_optional_executor(executor: Option<Arc<dyn Executor>>) -> Self {
        Self {
            inner: Inner::new(executor),
        }
    }

    /// Fulfills the promise with a value; returns whether this call won.
    pub fn set(&self, value: T) -> bool {
        self.complete(Outcome::Success(value))
    }

    /// Fails the promise; returns whether this call won.
    pub fn fail(&self, error: Error) -> bool {
        self.complete(Outcome::Failure(error))
    }

    /// Completes the promise with a ready outcome; returns whether this
    /// call won the single-assignment race.
    pub fn complete(&self, outcome: Outcome<T>) -> bool {
        if self.inner.slot.fill(outcome) {
            self.inner.callbacks.drain(self.inner.executor.as_ref());
            true
        } else {
            false
        }
    }

    /// The readable half.
    #[must_use]
    pub fn future(&self) -> EagerFuture<T> {
        EagerFuture {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("completed", &self.inner.slot.is_filled())
            .finish()
    }
}

/// A future that stores its outcome after first completion and replays
/// it to every subscriber, early or late.
///
/// Cloning is cheap and shares the same completion.
pub struct EagerFuture<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> EagerFuture<T> {
    // ── Construction ────────────────────────────────────────────────

    /// An already-successful future.
    #[must_use]
    pub fn from_value(value: T) -> Self {
        let promise = Promise::new();
        promise.set(value);
        promise.future()
    }

    /// An already-failed future.
    #[must_use]
    pub fn from_error(error: Error) -> Self {
        let promise = Promise::new();
        promise.fail(error);
        promise.future()
    }

    /// An already-completed future.
    #[must_use]
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        let promise = Promise::new();
        promise.complete(outcome);
        promise.future()
    }

    /// Runs `producer` immediately; the future memoizes whatever it
    /// eventually delivers.
    #[must_use]
    pub fn build(producer: impl Producer<T> + 'static) -> Self {
        Self::build_with_executor(Arc::new(producer), None)
    }

    pub(crate) fn build_with_executor(
        producer: Arc<dyn Producer<T>>,
        executor: Option<Arc<dyn Executor>>,
    ) -> Self {
        let promise = Promise::with_optional_executor(executor);
        let target = promise.clone();
        producer.produce(Box::new(move |outcome| {
            target.complete(outcome);
        }));
        promise.future()
    }

    /// Runs a blocking task on `executor`; the future completes with its
    /// result. The future fails with [`ErrorKind::Rejected`] if the
    /// executor refuses the job.
    #[must_use]
    pub fn submit<F>(executor: &Arc<dyn Executor>, task: F) -> Self
    where
        F: FnOnce() -> crate::Result<T> + Send + 'static,
    {
        Self::submit_inner(executor, task, None)
    }

    /// Like [`submit`](Self::submit), but the resulting future also
    /// dispatches its own callbacks through the same executor.
    #[must_use]
    pub fn submit_delegating<F>(executor: &Arc<dyn Executor>, task: F) -> Self
    where
        F: FnOnce() -> crate::Result<T> + Send + 'static,
    {
        Self::submit_inner(executor, task, Some(Arc::clone(executor)))
    }

    fn submit_inner<F>(
        executor: &Arc<dyn Executor>,
        task: F,
        dispatch: Option<Arc<dyn Executor>>,
    ) -> Self
    where
        F: FnOnce() -> crate::Result<T> + Send + 'static,
    {
        let promise = Promise::with_optional_executor(dispatch);
        let target = promise.clone();
        let job: Job = Box::new(move || {
            target.complete(run_user_task(task));
        });
        if executor.execute(job).is_err() {
            promise.fail(Error::new(ErrorKind::Rejected).with_message("worker pool refused the task"));
        }
        promise.future()
    }

    /// Runs `task` after `delay` on the scheduler's timer thread; the
    /// future completes with its result.
    #[must_use]
    pub fn schedule<S, F>(scheduler: &S, delay: Duration, task: F) -> Self
    where
        S: Scheduler + ?Sized,
        F: FnOnce() -> crate::Result<T> + Send + 'static,
    {
        let promise = Promise::new();
        let target = promise.clone();
        let token = scheduler.schedule(
            delay,
            Box::new(move || {
                target.complete(run_user_task(task));
            }),
        );
        if token.was_refused() {
            promise.fail(Error::new(ErrorKind::Rejected).with_message("scheduler refused the task"));
        }
        promise.future()
    }

    /// Materializes any future into an eager one by consuming it once.
    #[must_use]
    pub fn adopt(source: &(impl Promised<T> + ?Sized)) -> Self {
        let promise = Promise::new();
        let target = promise.clone();
        source.consume(Box::new(move |outcome| {
            target.complete(outcome);
        }));
        promise.future()
    }

    // ── Transformation ──────────────────────────────────────────────
    //
    // Every derived future inherits this future's dispatch executor. A
    // panic inside the user function becomes the derived future's
    // failure; it never unwinds into the completing thread.

    /// Transforms the success value; failures pass through.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> EagerFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| match outcome {
            Outcome::Success(value) => match catch_unwind(AssertUnwindSafe(move || f(value))) {
                Ok(mapped) => {
                    target.set(mapped);
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            },
            Outcome::Failure(error) => {
                target.fail(error);
            }
        }));
        promise.future()
    }

    /// Chains a future-returning continuation onto the success value;
    /// failures pass through.
    #[must_use]
    pub fn flat_map<U, R, F>(&self, f: F) -> EagerFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        R: Promised<U>,
        F: FnOnce(T) -> R + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| match outcome {
            Outcome::Success(value) => match catch_unwind(AssertUnwindSafe(move || f(value))) {
                Ok(next) => {
                    let target = target.clone();
                    next.consume(Box::new(move |next_outcome| {
                        target.complete(next_outcome);
                    }));
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            },
            Outcome::Failure(error) => {
                target.fail(error);
            }
        }));
        promise.future()
    }

    /// Turns a failure back into a value; successes pass through.
    #[must_use]
    pub fn recover<F>(&self, f: F) -> EagerFuture<T>
    where
        F: FnOnce(Error) -> T + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| match outcome {
            Outcome::Success(value) => {
                target.set(value);
            }
            Outcome::Failure(err) => match catch_unwind(AssertUnwindSafe(move || f(err))) {
                Ok(value) => {
                    target.set(value);
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            },
        }));
        promise.future()
    }

    /// Turns a failure into a fresh future; successes pass through.
    #[must_use]
    pub fn recover_with<R, F>(&self, f: F) -> EagerFuture<T>
    where
        R: Promised<T>,
        F: FnOnce(Error) -> R + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| match outcome {
            Outcome::Success(value) => {
                target.set(value);
            }
            Outcome::Failure(err) => match catch_unwind(AssertUnwindSafe(move || f(err))) {
                Ok(next) => {
                    let target = target.clone();
                    next.consume(Box::new(move |next_outcome| {
                        target.complete(next_outcome);
                    }));
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            },
        }));
        promise.future()
    }

    /// Continues with a handler that sees the outcome, success or
    /// failure, and produces a value.
    #[must_use]
    pub fn always<U, F>(&self, f: F) -> EagerFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| {
            match catch_unwind(AssertUnwindSafe(move || f(outcome))) {
                Ok(value) => {
                    target.set(value);
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            }
        }));
        promise.future()
    }

    /// Continues with a handler that sees the outcome and produces a
    /// fresh future.
    #[must_use]
    pub fn always_with<U, R, F>(&self, f: F) -> EagerFuture<U>
    where
        U: Clone + Send + Sync + 'static,
        R: Promised<U>,
        F: FnOnce(Outcome<T>) -> R + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| {
            match catch_unwind(AssertUnwindSafe(move || f(outcome))) {
                Ok(next) => {
                    let target = target.clone();
                    next.consume(Box::new(move |next_outcome| {
                        target.complete(next_outcome);
                    }));
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            }
        }));
        promise.future()
    }

    /// Side-effecting peek at the outcome; the outcome passes through
    /// unchanged unless the peek panics.
    #[must_use]
    pub fn and_then<F>(&self, f: F) -> EagerFuture<T>
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        let promise = Promise::with_optional_executor(self.inner.executor.clone());
        let target = promise.clone();
        self.consume(Box::new(move |outcome| {
            match catch_unwind(AssertUnwindSafe(|| f(&outcome))) {
                Ok(()) => {
                    target.complete(outcome);
                }
                Err(payload) => {
                    target.fail(Error::panicked(payload.as_ref()));
                }
            }
        }));
        promise.future()
    }

    // ── Consumption ─────────────────────────────────────────────────

    /// Registers a consumer; it fires exactly once with the memoized
    /// outcome, immediately if the future is already complete.
    pub fn consume(&self, consumer: Consumer<T>) {
        let inner = Arc::clone(&self.inner);
        let job: Job = Box::new(move || match inner.slot.get() {
            Some(outcome) => consumer(outcome.clone()),
            None => error!("eager future dispatched a callback before completion"),
        });
        self.inner.callbacks.push(job, self.inner.executor.as_ref());
    }

    /// The memoized outcome, if the future has completed.
    #[must_use]
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.inner.slot.get().cloned()
    }

    /// Returns true once the future has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.inner.slot.is_filled()
    }

    /// Blocks the calling thread until completion.
    ///
    /// # Errors
    ///
    /// Returns the future's own error when it failed.
    pub fn get(&self) -> crate::Result<T> {
        block_on(self, None)
    }

    /// Blocks the calling thread until completion or `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the future's own error, or a timeout error when nothing
    /// arrived in time.
    pub fn get_timeout(&self, timeout: Duration) -> crate::Result<T> {
        block_on(self, Some(timeout))
    }

    /// Eager futures are already materialized; this is the identity.
    #[must_use]
    pub fn materialize(&self) -> Self {
        self.clone()
    }

    // ── Timing ──────────────────────────────────────────────────────

    /// Caps the time to produce an outcome; see
    /// [`combinator::with_timeout`](crate::combinator::with_timeout).
    #[must_use]
    pub fn with_timeout<S>(&self, scheduler: &S, duration: Duration) -> Self
    where
        S: Scheduler + ?Sized,
    {
        self.with_timeout_described(scheduler, duration, "unnamed task")
    }

    /// Like [`with_timeout`](Self::with_timeout) with a task description
    /// for the timeout error.
    #[must_use]
    pub fn with_timeout_described<S>(
        &self,
        scheduler: &S,
        duration: Duration,
        description: &str,
    ) -> Self
    where
        S: Scheduler + ?Sized,
    {
        crate::combinator::with_timeout_described(scheduler, self.clone(), duration, description)
    }
}

impl<T> Clone for EagerFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Promised<T> for EagerFuture<T> {
    fn consume(&self, consumer: Consumer<T>) {
        Self::consume(self, consumer);
    }
}

impl<T> fmt::Debug for EagerFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerFuture")
            .field("completed", &self.inner.slot.is_filled())
            .field("drained", &self.inner.callbacks.is_drained())
            .finish()
    }
}
