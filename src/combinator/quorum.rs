//! Best-N-of-M completion.
//!
//! [`first`] completes a combined future as soon as enough inputs have
//! succeeded, without waiting for stragglers. It generalizes the other
//! N-ary combinators:
//!
//! - `all(fail_on_error, futures)` is `first` with `num_of_success = N`
//! - a quorum read is `first(replicas, quorum, false)`
//! - [`first_within`] adds a deadline that force-finishes the combined
//!   future with whatever accumulated so far
//!
//! # Bookkeeping
//!
//! Progress lives in a [`Status`] snapshot packed into one atomic word
//! and advanced with a compare-and-swap retry loop, so concurrent input
//! completions are never double-counted and exactly one transition
//! observes "done" and completes the output. Results are written to
//! per-index slots, keeping output positions stable regardless of
//! completion order.

use crate::future::{EagerFuture, Promise, Promised};
use crate::outcome::Outcome;
use crate::time::Scheduler;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const COUNT_BITS: u32 = 31;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;
const FINISHED_BIT: u64 = 1 << (2 * COUNT_BITS);

/// Immutable snapshot of a combined operation's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Number of input futures.
    pub total: usize,
    /// Successes required to finish early.
    pub min_successful: usize,
    /// Inputs that have completed either way.
    pub completed: usize,
    /// Inputs that have succeeded.
    pub succeeded: usize,
    /// Set when a failure (under fail-fast) or a deadline forced the end.
    pub finished: bool,
}

impl Status {
    /// Whether the combined operation is over: forced to finish, out of
    /// inputs, or holding enough successes.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.finished || self.completed == self.total || self.succeeded >= self.min_successful
    }
}

/// The mutable half of a [`Status`], packed into one atomic word.
struct StatusCell {
    total: usize,
    min_successful: usize,
    bits: AtomicU64,
}

impl StatusCell {
    fn new(total: usize, min_successful: usize) -> Self {
        debug_assert!((total as u64) <= COUNT_MASK, "too many input futures");
        Self {
            total,
            min_successful,
            bits: AtomicU64::new(0),
        }
    }

    fn decode(&self, bits: u64) -> Status {
        Status {
            total: self.total,
            min_successful: self.min_successful,
            completed: (bits & COUNT_MASK) as usize,
            succeeded: ((bits >> COUNT_BITS) & COUNT_MASK) as usize,
            finished: bits & FINISHED_BIT != 0,
        }
    }

    fn encode(status: Status) -> u64 {
        let mut bits = (status.completed as u64) & COUNT_MASK;
        bits |= ((status.succeeded as u64) & COUNT_MASK) << COUNT_BITS;
        if status.finished {
            bits |= FINISHED_BIT;
        }
        bits
    }

    /// Applies `advance` to the current snapshot under a compare-and-swap
    /// retry loop. Returns the snapshot that landed, or `None` when the
    /// operation was already done, so exactly one caller observes each
    /// transition.
    fn try_advance(&self, advance: impl Fn(Status) -> Status) -> Option<Status> {
        loop {
            let bits = self.bits.load(Ordering::Acquire);
            let current = self.decode(bits);
            if current.is_done() {
                return None;
            }
            let next = advance(current);
            if self
                .bits
                .compare_exchange(bits, Self::encode(next), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(next);
            }
        }
    }
}

fn collect<T: Clone>(slots: &[OnceLock<T>]) -> Vec<Option<T>> {
    slots.iter().map(|slot| slot.get().cloned()).collect()
}

/// Completes once `num_of_success` inputs have succeeded, or every input
/// has completed, whichever comes first.
///
/// The output preserves input positions; slots for failed or
/// still-pending inputs are `None`. With `fail_on_error`, the first
/// observed failure completes the output with that error immediately.
/// An empty input completes immediately with an empty vec.
pub fn first<T, F>(
    futures: Vec<F>,
    num_of_success: usize,
    fail_on_error: bool,
) -> EagerFuture<Vec<Option<T>>>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
{
    run_first::<T, F, dyn Scheduler>(futures, num_of_success, fail_on_error, None)
}

/// [`first`] with a deadline: when `duration` elapses before the quorum
/// is reached, the combined future completes with whatever accumulated.
pub fn first_within<T, F, S>(
    futures: Vec<F>,
    num_of_success: usize,
    fail_on_error: bool,
    scheduler: &S,
    duration: Duration,
) -> EagerFuture<Vec<Option<T>>>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
    S: Scheduler + ?Sized,
{
    run_first(futures, num_of_success, fail_on_error, Some((scheduler, duration)))
}

pub(crate) fn run_first<T, F, S>(
    futures: Vec<F>,
    num_of_success: usize,
    fail_on_error: bool,
    timeout: Option<(&S, Duration)>,
) -> EagerFuture<Vec<Option<T>>>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
    S: Scheduler + ?Sized,
{
    if futures.is_empty() {
        return EagerFuture::from_value(Vec::new());
    }
    if num_of_success == 0 {
        // A zero-success quorum is already satisfied; nothing has
        // completed yet, so every slot is empty.
        return EagerFuture::from_value(vec![None; futures.len()]);
    }

    let total = futures.len();
    let promise = Promise::new();
    let slots: Arc<Vec<OnceLock<T>>> = Arc::new((0..total).map(|_| OnceLock::new()).collect());
    let status = Arc::new(StatusCell::new(total, num_of_success));

    if let Some((scheduler, duration)) = timeout {
        let promise = promise.clone();
        let slots = Arc::clone(&slots);
        let status = Arc::clone(&status);
        // The token is dropped: a deadline firing after the quorum is
        // done loses the try_advance race and does nothing.
        drop(scheduler.schedule(
            duration,
            Box::new(move || {
                if status
                    .try_advance(|current| Status {
                        finished: true,
                        ..current
                    })
                    .is_some()
                {
                    promise.set(collect(&slots));
                }
            }),
        ));
    }

    for (index, future) in futures.into_iter().enumerate() {
        let promise = promise.clone();
        let slots = Arc::clone(&slots);
        let status = Arc::clone(&status);
        future.consume(Box::new(move |outcome| match outcome {
            Outcome::Success(value) => {
                let _ = slots[index].set(value);
                if let Some(next) = status.try_advance(|current| Status {
                    completed: current.completed + 1,
                    succeeded: current.succeeded + 1,
                    ..current
                }) {
                    if next.is_done() {
                        promise.set(collect(&slots));
                    }
                }
            }
            Outcome::Failure(error) => {
                if let Some(next) = status.try_advance(|current| Status {
                    completed: current.completed + 1,
                    finished: current.finished || fail_on_error,
                    ..current
                }) {
                    if fail_on_error {
                        promise.fail(error);
                    } else if next.is_done() {
                        promise.set(collect(&slots));
                    }
                }
            }
        }));
    }

    promise.future()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn status_packing_round_trips() {
        let cell = StatusCell::new(5, 3);
        let status = Status {
            total: 5,
            min_successful: 3,
            completed: 4,
            succeeded: 2,
            finished: true,
        };
        assert_eq!(cell.decode(StatusCell::encode(status)), status);
    }

    #[test]
    fn try_advance_stops_once_done() {
        let cell = StatusCell::new(2, 1);
        let first = cell.try_advance(|s| Status {
            completed: s.completed + 1,
            succeeded: s.succeeded + 1,
            ..s
        });
        assert!(first.is_some_and(|s| s.is_done()));
        let second = cell.try_advance(|s| Status {
            completed: s.completed + 1,
            ..s
        });
        assert!(second.is_none(), "advance after done must be refused");
    }

    #[test]
    fn quorum_completes_without_stragglers() {
        let fast_a = EagerFuture::from_value(1);
        let fast_b = EagerFuture::from_value(2);
        let never: Promise<i32> = Promise::new();
        let combined = first(vec![fast_a, fast_b, never.future()], 2, false);
        let values = combined.get().unwrap();
        assert_eq!(values, vec![Some(1), Some(2), None]);
    }

    #[test]
    fn positions_track_inputs_not_completion_order() {
        let slow: Promise<i32> = Promise::new();
        let combined = first(vec![slow.future(), EagerFuture::from_value(9)], 2, false);
        slow.set(4);
        assert_eq!(combined.get().unwrap(), vec![Some(4), Some(9)]);
    }

    #[test]
    fn failures_count_toward_completion_when_tolerated() {
        let combined = first(
            vec![
                EagerFuture::from_value(1),
                EagerFuture::from_error(Error::computation("down")),
            ],
            2,
            false,
        );
        assert_eq!(combined.get().unwrap(), vec![Some(1), None]);
    }

    #[test]
    fn empty_input_is_an_empty_vec() {
        let combined = first(Vec::<EagerFuture<i32>>::new(), 1, true);
        assert_eq!(combined.get().unwrap(), Vec::<Option<i32>>::new());
    }

    #[test]
    fn zero_quorum_is_satisfied_immediately() {
        let pending: Promise<i32> = Promise::new();
        let combined = first(vec![pending.future()], 0, false);
        assert_eq!(combined.get().unwrap(), vec![None]);
    }
}
