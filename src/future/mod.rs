//! The composable future surface.
//!
//! A future here is a *callback holder*, not a poll-driven state machine:
//! producers push an [`Outcome`] into consumers whenever the underlying
//! computation finishes, on whatever thread finished it. The two
//! implementations differ only in completion semantics:
//!
//! - [`EagerFuture`](eager::EagerFuture) runs its producer once and
//!   memoizes the outcome for every subscriber;
//! - [`LazyFuture`](lazy::LazyFuture) stores the producer and re-runs it
//!   for every subscriber.
//!
//! Everything downstream — combinators, timeouts, hedged dispatch —
//! operates through the minimal [`Promised`] trait, so it never cares
//! which variant it was handed.

use crate::error::{Error, ErrorKind};
use crate::outcome::Outcome;
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod eager;
pub mod lazy;

pub use eager::{EagerFuture, Promise};
pub use lazy::LazyFuture;

/// A one-shot receiver for a computation's outcome.
pub type Consumer<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// A computation that eventually delivers an outcome to a consumer.
///
/// Producers back lazy futures, so they must be re-invocable: each
/// subscription hands the producer a fresh consumer.
pub trait Producer<T>: Send + Sync {
    /// Starts (or restarts) the computation for one consumer.
    fn produce(&self, consumer: Consumer<T>);
}

impl<T, F> Producer<T> for F
where
    F: Fn(Consumer<T>) + Send + Sync,
{
    fn produce(&self, consumer: Consumer<T>) {
        self(consumer);
    }
}

/// A handle to a value or error that becomes available asynchronously.
///
/// This is the only interface the combinators and the surrounding
/// service layers see. The transformation surface (`map`, `flat_map`,
/// ...) lives on the concrete types because eager and lazy futures wire
/// transforms fundamentally differently.
pub trait Promised<T>: Send + Sync {
    /// Registers a consumer for the outcome.
    ///
    /// Eager futures serve it from the memoized result (immediately when
    /// already complete); lazy futures re-run their producer for it.
    fn consume(&self, consumer: Consumer<T>);
}

impl<T, P> Promised<T> for Arc<P>
where
    P: Promised<T> + ?Sized,
{
    fn consume(&self, consumer: Consumer<T>) {
        (**self).consume(consumer);
    }
}

impl<T, P> Promised<T> for Box<P>
where
    P: Promised<T> + ?Sized,
{
    fn consume(&self, consumer: Consumer<T>) {
        (**self).consume(consumer);
    }
}

/// A consumer that several racing branches may try to satisfy; only the
/// first delivery gets through.
pub(crate) struct SharedConsumer<T> {
    cell: Arc<Mutex<Option<Consumer<T>>>>,
}

impl<T> SharedConsumer<T> {
    pub(crate) fn new(consumer: Consumer<T>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(Some(consumer))),
        }
    }

    /// Delivers `outcome` unless another branch got here first.
    pub(crate) fn deliver(&self, outcome: Outcome<T>) {
        let consumer = self.cell.lock().take();
        if let Some(consumer) = consumer {
            consumer(outcome);
        }
    }
}

impl<T> Clone for SharedConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Runs a user task, converting a panic into a `Panicked` failure.
pub(crate) fn run_user_task<T>(task: impl FnOnce() -> crate::Result<T>) -> Outcome<T> {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(result) => result.into(),
        Err(payload) => Outcome::Failure(Error::panicked(payload.as_ref())),
    }
}

struct WaitCell<T> {
    slot: Mutex<Option<Outcome<T>>>,
    condvar: Condvar,
}

/// Blocks the calling thread until `future` delivers, or `timeout`
/// expires.
pub(crate) fn block_on<T, P>(future: &P, timeout: Option<Duration>) -> crate::Result<T>
where
    T: Send + 'static,
    P: Promised<T> + ?Sized,
{
    let cell = Arc::new(WaitCell {
        slot: Mutex::new(None),
        condvar: Condvar::new(),
    });
    let filler = Arc::clone(&cell);
    future.consume(Box::new(move |outcome| {
        *filler.slot.lock() = Some(outcome);
        filler.condvar.notify_all();
    }));

    let mut guard = cell.slot.lock();
    match timeout {
        None => {
            while guard.is_none() {
                cell.condvar.wait(&mut guard);
            }
        }
        Some(duration) => {
            let deadline = Instant::now() + duration;
            while guard.is_none() {
                if cell.condvar.wait_until(&mut guard, deadline).timed_out() && guard.is_none() {
                    return Err(Error::timeout("blocking get", duration));
                }
            }
        }
    }
    match guard.take() {
        Some(outcome) => outcome.into_result(),
        None => Err(Error::new(ErrorKind::Internal).with_message("wait cell emptied twice")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_consumer_delivers_once() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let probe = Arc::clone(&delivered);
        let shared = SharedConsumer::new(Box::new(move |outcome: Outcome<i32>| {
            probe.lock().push(outcome.into_result().ok());
        }));
        let racer = shared.clone();
        shared.deliver(Outcome::success(1));
        racer.deliver(Outcome::success(2));
        assert_eq!(*delivered.lock(), vec![Some(1)]);
    }

    #[test]
    fn run_user_task_catches_panics() {
        let outcome: Outcome<i32> = run_user_task(|| panic!("task bug"));
        assert!(outcome.error().is_some_and(Error::is_panic));

        let fine = run_user_task(|| Ok(3));
        assert_eq!(fine.value(), Some(&3));
    }
}
