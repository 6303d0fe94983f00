//! Append-until-drained callback queue.

use crate::executor::{Executor, Job};
use crate::tracing_compat::warn;
use crossbeam_queue::SegQueue;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The pending-callback list of an eager future.
///
/// Callbacks accumulate until the owning future completes, at which point
/// the list is drained exactly once and every queued callback runs with
/// the final outcome. A callback registered after the drain runs
/// immediately instead of being queued; it is never silently dropped.
///
/// The drain protocol: the drainer flips `drained` and then pops the
/// queue dry. An appender that pushed concurrently re-checks the flag
/// after its push and, if the drain already started, pops the queue
/// itself — whichever side pops a given callback runs it, and `SegQueue`
/// pops are atomic, so each callback runs exactly once. Within one
/// future, queued callbacks run in registration order.
pub struct CallbackList {
    queue: SegQueue<Job>,
    drained: AtomicBool,
}

impl CallbackList {
    /// Creates an empty, undrained list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            drained: AtomicBool::new(false),
        }
    }

    /// Registers a callback, or runs it immediately when the list has
    /// already been drained.
    pub fn push(&self, job: Job, executor: Option<&Arc<dyn Executor>>) {
        if self.drained.load(Ordering::Acquire) {
            Self::run(job, executor);
            return;
        }
        self.queue.push(job);
        if self.drained.load(Ordering::Acquire) {
            // Raced with the drain; whatever the drainer missed is ours.
            self.run_queued(executor);
        }
    }

    /// Drains the list and runs everything collected so far.
    ///
    /// Only the completing thread calls this, exactly once per future;
    /// calling it again is harmless.
    pub fn drain(&self, executor: Option<&Arc<dyn Executor>>) {
        self.drained.store(true, Ordering::Release);
        self.run_queued(executor);
    }

    /// Returns true once the drain has started.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.drained.load(Ordering::Acquire)
    }

    fn run_queued(&self, executor: Option<&Arc<dyn Executor>>) {
        while let Some(job) = self.queue.pop() {
            Self::run(job, executor);
        }
    }

    /// Runs one callback, dispatching through the executor when present.
    ///
    /// A panic from the callback is caught and logged so it cannot block
    /// delivery to sibling subscribers; a rejected dispatch falls back to
    /// running inline.
    fn run(job: Job, executor: Option<&Arc<dyn Executor>>) {
        let job = match executor {
            Some(executor) => match executor.try_execute(job) {
                Ok(()) => return,
                Err(job) => {
                    warn!("dispatch executor rejected a callback; running inline");
                    job
                }
            },
            None => job,
        };
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("future callback panicked; suppressed to protect sibling subscribers");
        }
    }
}

impl Default for CallbackList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackList")
            .field("queued", &self.queue.len())
            .field("drained", &self.drained.load(Ordering::Relaxed))
            .finish()
    }
}
