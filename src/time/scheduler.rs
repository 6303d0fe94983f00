//! Timer-thread scheduler.

use crate::config::SchedulerConfig;
use crate::executor::Job;
use crate::tracing_compat::{debug, warn};
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Something that can run a job after a delay.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run once `delay` has elapsed.
    ///
    /// The returned token cancels the task if it has not fired yet.
    fn schedule(&self, delay: Duration, task: Job) -> CancelToken;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, delay: Duration, task: Job) -> CancelToken {
        (**self).schedule(delay, task)
    }
}

/// Cancellation handle for one scheduled task.
///
/// The token and the timer thread race for the same flag: whoever swaps
/// it first wins, so a task is either cancelled or fired, never both.
#[derive(Debug, Clone)]
pub struct CancelToken {
    claimed: Arc<AtomicBool>,
    refused: bool,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            claimed: Arc::new(AtomicBool::new(false)),
            refused: false,
        }
    }

    /// A token for a task the scheduler refused to accept; it will never
    /// fire.
    #[must_use]
    pub fn refused() -> Self {
        let mut token = Self::new();
        token.claimed.store(true, Ordering::Release);
        token.refused = true;
        token
    }

    /// Cancels the pending task; returns true if the task had not fired.
    pub fn cancel(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Returns true once the task fired or was cancelled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Returns true when the scheduler never accepted the task at all.
    #[must_use]
    pub const fn was_refused(&self) -> bool {
        self.refused
    }
}

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    job: Job,
    claimed: Arc<AtomicBool>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed so the std max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct HeapState {
    heap: BinaryHeap<TimerEntry>,
    shutdown: bool,
}

struct SchedulerInner {
    state: Mutex<HeapState>,
    condvar: Condvar,
    seq: AtomicU64,
}

impl SchedulerInner {
    fn worker_loop(&self) {
        loop {
            let mut due: SmallVec<[TimerEntry; 4]> = SmallVec::new();
            {
                let mut state = self.state.lock();
                while due.is_empty() {
                    if state.shutdown {
                        let pending = state.heap.len();
                        for entry in state.heap.drain() {
                            entry.claimed.store(true, Ordering::Release);
                        }
                        if pending > 0 {
                            debug!("timer shutdown cancelled {pending} pending tasks");
                        }
                        return;
                    }
                    let now = Instant::now();
                    while let Some(entry) = state.heap.peek() {
                        if entry.deadline > now {
                            break;
                        }
                        if let Some(entry) = state.heap.pop() {
                            due.push(entry);
                        }
                    }
                    if !due.is_empty() {
                        break;
                    }
                    match state.heap.peek().map(|entry| entry.deadline) {
                        Some(deadline) => {
                            let _ = self.condvar.wait_until(&mut state, deadline);
                        }
                        None => self.condvar.wait(&mut state),
                    }
                }
            }
            for entry in due {
                // Losing the swap means the token cancelled us first.
                if !entry.claimed.swap(true, Ordering::AcqRel)
                    && catch_unwind(AssertUnwindSafe(entry.job)).is_err()
                {
                    warn!("scheduled task panicked; timer thread continues");
                }
            }
        }
    }
}

/// A scheduler backed by one dedicated timer thread and a deadline heap.
///
/// Tasks run on the timer thread itself; anything heavyweight should
/// bounce to an executor from inside the task. Pending tasks are
/// cancelled (not fired) on shutdown.
pub struct TimerScheduler {
    inner: Arc<SchedulerInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
    /// Starts the timer thread with the default config.
    ///
    /// # Panics
    ///
    /// Panics if the timer thread cannot be spawned.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default()).expect("spawn timer thread")
    }

    /// Starts the timer thread with the given config.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the timer thread cannot be spawned.
    pub fn with_config(config: &SchedulerConfig) -> std::io::Result<Self> {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(HeapState {
                heap: BinaryHeap::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
            seq: AtomicU64::new(0),
        });
        let worker = Arc::clone(&inner);
        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.worker_loop())?;
        Ok(Self {
            inner,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stops the timer thread; pending tasks are cancelled, not fired.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.inner.condvar.notify_all();
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("timer thread exited by panic during shutdown");
            }
        }
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, delay: Duration, task: Job) -> CancelToken {
        let token = CancelToken::new();
        {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                warn!("schedule refused: timer is shut down");
                return CancelToken::refused();
            }
            state.heap.push(TimerEntry {
                deadline: Instant::now() + delay,
                seq: self.inner.seq.fetch_add(1, Ordering::Relaxed),
                job: task,
                claimed: Arc::clone(&token.claimed),
            });
        }
        self.inner.condvar.notify_one();
        token
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        // Cancelled entries sit in the heap until their deadline; only
        // unclaimed ones are really pending.
        let pending = state
            .heap
            .iter()
            .filter(|entry| !entry.claimed.load(Ordering::Relaxed))
            .count();
        f.debug_struct("TimerScheduler")
            .field("pending", &pending)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn fires_after_delay() {
        let scheduler = TimerScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&fired);
        let started = Instant::now();
        scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                probe.store(true, Ordering::SeqCst);
            }),
        );
        while !fired.load(Ordering::SeqCst) {
            assert!(started.elapsed() < Duration::from_secs(5), "task never fired");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn fires_in_deadline_order() {
        let scheduler = TimerScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, delay_ms) in [(3u32, 60u64), (1, 20), (2, 40)] {
            let order = Arc::clone(&order);
            scheduler.schedule(
                Duration::from_millis(delay_ms),
                Box::new(move || {
                    order.lock().push(label);
                }),
            );
        }
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn cancel_prevents_firing() {
        let scheduler = TimerScheduler::new();
        let fired = Arc::new(AtomicU32::new(0));
        let probe = Arc::clone(&fired);
        let token = scheduler.schedule(
            Duration::from_millis(30),
            Box::new(move || {
                probe.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(token.cancel());
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        // Second cancel is a no-op.
        assert!(!token.cancel());
    }

    #[test]
    fn cancel_after_firing_reports_loss() {
        let scheduler = TimerScheduler::new();
        let token = scheduler.schedule(Duration::from_millis(5), Box::new(|| {}));
        std::thread::sleep(Duration::from_millis(100));
        assert!(token.is_settled());
        assert!(!token.cancel());
    }

    #[test]
    fn shutdown_cancels_pending_tasks() {
        let scheduler = TimerScheduler::new();
        let fired = Arc::new(AtomicU32::new(0));
        let probe = Arc::clone(&fired);
        scheduler.schedule(
            Duration::from_secs(30),
            Box::new(move || {
                probe.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.shutdown();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        let token = scheduler.schedule(Duration::from_millis(1), Box::new(|| {}));
        assert!(token.was_refused());
        assert!(token.is_settled());
    }

    #[test]
    fn task_panic_does_not_kill_timer() {
        let scheduler = TimerScheduler::new();
        scheduler.schedule(Duration::from_millis(5), Box::new(|| panic!("timer task bug")));
        let fired = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&fired);
        scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                probe.store(true, Ordering::SeqCst);
            }),
        );
        let started = Instant::now();
        while !fired.load(Ordering::SeqCst) {
            assert!(started.elapsed() < Duration::from_secs(5), "timer thread died");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
