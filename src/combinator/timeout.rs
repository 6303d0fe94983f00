//! Scheduler-backed deadline racing.

use super::race::any;
use crate::error::Error;
use crate::future::{EagerFuture, Promise, Promised};
use crate::time::Scheduler;
use std::time::Duration;

/// Caps the time `future` may take to produce an outcome.
///
/// The source races a deadline promise that the scheduler fails after
/// `duration`; whichever completes first wins. When the source wins, the
/// pending deadline task is cancelled through its token so the timer heap
/// stays clean.
///
/// The losing computation is *not* stopped: a result arriving after the
/// timeout fired is simply discarded. Callers whose computations have
/// side effects must account for both branches having run.
pub fn with_timeout<T, F, S>(scheduler: &S, future: F, duration: Duration) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
    S: Scheduler + ?Sized,
{
    with_timeout_described(scheduler, future, duration, "unnamed task")
}

/// [`with_timeout`] with a task description for the timeout error.
pub fn with_timeout_described<T, F, S>(
    scheduler: &S,
    future: F,
    duration: Duration,
    description: &str,
) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
    S: Scheduler + ?Sized,
{
    let source = EagerFuture::adopt(&future);
    let deadline = Promise::new();
    let target = deadline.clone();
    let timeout_error = Error::timeout(description, duration);
    let token = scheduler.schedule(
        duration,
        Box::new(move || {
            target.fail(timeout_error);
        }),
    );
    source.consume(Box::new(move |_| {
        token.cancel();
    }));
    any(vec![source, deadline.future()])
}
