//! Wait-for-everything joining.

use super::quorum;
use crate::future::{EagerFuture, Promised};
use crate::time::Scheduler;
use std::time::Duration;

/// Completes when every input has completed.
///
/// With `fail_on_error`, the first observed failure completes the output
/// with that error immediately, ignoring still-pending inputs. Without
/// it, the output waits for everyone and preserves positions, with `None`
/// in the slots that failed.
///
/// This is the quorum engine asked for `N` of `N` successes.
pub fn all<T, F>(fail_on_error: bool, futures: Vec<F>) -> EagerFuture<Vec<Option<T>>>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
{
    let total = futures.len();
    quorum::first(futures, total, fail_on_error)
}

/// [`all`] with a deadline: when `duration` elapses first, the output
/// completes with whatever has accumulated so far.
pub fn all_within<T, F, S>(
    fail_on_error: bool,
    futures: Vec<F>,
    scheduler: &S,
    duration: Duration,
) -> EagerFuture<Vec<Option<T>>>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
    S: Scheduler + ?Sized,
{
    let total = futures.len();
    quorum::first_within(futures, total, fail_on_error, scheduler, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::future::Promise;

    #[test]
    fn waits_for_every_input() {
        let pending: Promise<i32> = Promise::new();
        let combined = all(false, vec![EagerFuture::from_value(1), pending.future()]);
        assert!(combined.peek().is_none(), "completed before all inputs");
        pending.set(2);
        assert_eq!(combined.get().unwrap(), vec![Some(1), Some(2)]);
    }

    #[test]
    fn fail_fast_skips_the_stragglers() {
        let never_a: Promise<i32> = Promise::new();
        let never_b: Promise<i32> = Promise::new();
        let combined = all(
            true,
            vec![
                never_a.future(),
                EagerFuture::from_error(Error::computation("immediate")),
                never_b.future(),
            ],
        );
        assert!(combined.get().is_err());
    }

    #[test]
    fn tolerant_join_yields_partial_results() {
        let combined = all(
            false,
            vec![
                EagerFuture::from_value(1),
                EagerFuture::from_error(Error::computation("gone")),
                EagerFuture::from_value(3),
            ],
        );
        assert_eq!(combined.get().unwrap(), vec![Some(1), None, Some(3)]);
    }
}
