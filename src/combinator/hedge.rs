//! Speculative second dispatch (latency hedging).

use super::race::any;
use crate::error::Error;
use crate::future::{EagerFuture, Promise, Promised};
use crate::time::Scheduler;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Invokes `action` once; if it has not completed within `delay`, invokes
/// it a second time and keeps whichever invocation finishes first.
///
/// Hedging trades duplicated work for tail latency: a stuck primary is
/// overtaken by a fresh backup instead of being waited out.
///
/// One atomic flag serves both sides: the primary completing sets it so
/// the scheduled task will not dispatch a backup, and the scheduled task
/// claims it so only one backup can ever launch. The losing invocation
/// keeps running and its side effects are not undone — `action` must be
/// idempotent or side-effect-free.
pub fn double_dispatch<T, R, F, S>(scheduler: &S, delay: Duration, action: F) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    R: Promised<T>,
    F: Fn() -> R + Send + 'static,
    S: Scheduler + ?Sized,
{
    let first = EagerFuture::adopt(&action());
    let settled = Arc::new(AtomicBool::new(false));
    {
        let settled = Arc::clone(&settled);
        first.consume(Box::new(move |_| {
            settled.store(true, Ordering::Release);
        }));
    }

    let second = Promise::new();
    {
        let target = second.clone();
        let settled = Arc::clone(&settled);
        drop(scheduler.schedule(
            delay,
            Box::new(move || {
                if !settled.swap(true, Ordering::AcqRel) {
                    match catch_unwind(AssertUnwindSafe(|| action())) {
                        Ok(backup) => {
                            backup.consume(Box::new(move |outcome| {
                                target.complete(outcome);
                            }));
                        }
                        Err(payload) => {
                            target.fail(Error::panicked(payload.as_ref()));
                        }
                    }
                }
            }),
        ));
    }

    any(vec![first, second.future()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimerScheduler;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn fast_primary_means_no_second_dispatch() {
        let scheduler = TimerScheduler::new();
        let dispatches = Arc::new(AtomicU32::new(0));
        let probe = Arc::clone(&dispatches);
        let result = double_dispatch(&scheduler, Duration::from_millis(50), move || {
            probe.fetch_add(1, Ordering::SeqCst);
            EagerFuture::from_value(1)
        });
        assert_eq!(result.get().unwrap(), 1);
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(dispatches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stuck_primary_triggers_a_backup() {
        let scheduler = TimerScheduler::new();
        let dispatches = Arc::new(AtomicU32::new(0));
        let probe = Arc::clone(&dispatches);
        let result = double_dispatch(&scheduler, Duration::from_millis(20), move || {
            if probe.fetch_add(1, Ordering::SeqCst) == 0 {
                // First invocation never completes.
                Promise::new().future()
            } else {
                EagerFuture::from_value(2)
            }
        });
        assert_eq!(result.get().unwrap(), 2);
        assert_eq!(dispatches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backup_panic_is_contained() {
        let scheduler = TimerScheduler::new();
        let dispatches = Arc::new(AtomicU32::new(0));
        let probe = Arc::clone(&dispatches);
        let result = double_dispatch(&scheduler, Duration::from_millis(10), move || {
            if probe.fetch_add(1, Ordering::SeqCst) == 0 {
                Promise::<i32>::new().future()
            } else {
                panic!("backup constructor bug")
            }
        });
        assert!(result.get().unwrap_err().is_panic());
    }
}
