//! Bounded retry on failure.

use super::timeout::with_timeout;
use crate::future::{EagerFuture, Promised};
use crate::time::Scheduler;
use std::sync::Arc;
use std::time::Duration;

/// Invokes `action` and, on failure, re-invokes it up to `retries` more
/// times; the first success (or the last failure) is the result.
pub fn retry<T, R, F>(retries: usize, action: F) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    R: Promised<T>,
    F: Fn() -> R + Send + Sync + 'static,
{
    retry_inner(Arc::new(action), retries)
}

fn retry_inner<T, R, F>(action: Arc<F>, retries_left: usize) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    R: Promised<T>,
    F: Fn() -> R + Send + Sync + 'static,
{
    let attempt = EagerFuture::adopt(&action());
    attempt.recover_with(move |error| {
        if retries_left == 0 {
            EagerFuture::from_error(error)
        } else {
            retry_inner(action, retries_left - 1)
        }
    })
}

/// [`retry`] with every attempt individually capped at `duration`, so a
/// hung attempt counts as a failure instead of stalling the whole chain.
pub fn retry_with_timeout<T, R, F>(
    retries: usize,
    scheduler: &Arc<dyn Scheduler>,
    duration: Duration,
    action: F,
) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    R: Promised<T>,
    F: Fn() -> R + Send + Sync + 'static,
{
    retry_timed_inner(Arc::new(action), retries, Arc::clone(scheduler), duration)
}

fn retry_timed_inner<T, R, F>(
    action: Arc<F>,
    retries_left: usize,
    scheduler: Arc<dyn Scheduler>,
    duration: Duration,
) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    R: Promised<T>,
    F: Fn() -> R + Send + Sync + 'static,
{
    let attempt = with_timeout(&scheduler, action(), duration);
    attempt.recover_with(move |error| {
        if retries_left == 0 {
            EagerFuture::from_error(error)
        } else {
            retry_timed_inner(action, retries_left - 1, scheduler, duration)
        }
    })
}
