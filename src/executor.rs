//! Job executors for dispatching completions off the completing thread.
//!
//! The core never mandates a thread pool: a future with no executor runs
//! its callbacks synchronously on whichever thread completes it. When a
//! future *is* given an executor, every callback dispatch and producer
//! invocation goes through [`Executor::try_execute`] instead.
//!
//! [`WorkerPool`] is the built-in implementation: a fixed set of named
//! worker threads fed from a lock-free queue, parked on a condvar while
//! idle. Shutdown is graceful: workers finish the queued backlog, and any
//! job that slips past the races is run inline by [`WorkerPool::shutdown`]
//! so nothing is silently dropped.

use crate::config::PoolConfig;
use crate::tracing_compat::{debug, warn};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Error returned when an executor refuses a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("executor is shut down")]
pub struct RejectedError;

/// Something that can run jobs on some thread, eventually.
pub trait Executor: Send + Sync {
    /// Attempts to accept `job`, handing it back when the executor cannot
    /// take more work (typically after shutdown).
    ///
    /// # Errors
    ///
    /// Returns the job itself so the caller can decide to run it inline
    /// or drop it.
    fn try_execute(&self, job: Job) -> Result<(), Job>;

    /// Accepts `job`, dropping it with a [`RejectedError`] on refusal.
    ///
    /// # Errors
    ///
    /// Returns [`RejectedError`] when the job was refused; the job is
    /// gone by then.
    fn execute(&self, job: Job) -> Result<(), RejectedError> {
        match self.try_execute(job) {
            Ok(()) => Ok(()),
            Err(job) => {
                drop(job);
                Err(RejectedError)
            }
        }
    }
}

struct PoolInner {
    /// Work feed; lock-free so producers never contend with each other.
    queue: SegQueue<Job>,
    /// Parking lot for idle workers. The mutex guards nothing but the
    /// condvar protocol; the queue itself is lock-free.
    idle_lock: Mutex<()>,
    idle_condvar: Condvar,
    shutdown: AtomicBool,
    pending: AtomicUsize,
    busy: AtomicUsize,
}

impl PoolInner {
    fn run_job(job: Job) {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("worker pool job panicked; worker thread continues");
        }
    }

    fn worker_loop(&self) {
        loop {
            if let Some(job) = self.queue.pop() {
                self.pending.fetch_sub(1, Ordering::Relaxed);
                self.busy.fetch_add(1, Ordering::Relaxed);
                Self::run_job(job);
                self.busy.fetch_sub(1, Ordering::Relaxed);
                continue;
            }
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            let mut guard = self.idle_lock.lock();
            // Re-check under the lock so a push that raced our empty pop
            // cannot strand us parked.
            if self.queue.is_empty() && !self.shutdown.load(Ordering::Acquire) {
                self.idle_condvar.wait(&mut guard);
            }
        }
    }
}

/// A fixed-size pool of named worker threads.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawns `config.workers` threads named `<prefix>-<index>`.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if a worker thread cannot be spawned.
    pub fn new(config: &PoolConfig) -> std::io::Result<Self> {
        let inner = Arc::new(PoolInner {
            queue: SegQueue::new(),
            idle_lock: Mutex::new(()),
            idle_condvar: Condvar::new(),
            shutdown: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            busy: AtomicUsize::new(0),
        });

        let mut threads = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let worker = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name_prefix))
                .spawn(move || worker.worker_loop())?;
            threads.push(handle);
        }

        Ok(Self {
            inner,
            threads: Mutex::new(threads),
        })
    }

    /// Number of jobs accepted but not yet started.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.inner.pending.load(Ordering::Relaxed)
    }

    /// Returns true once [`shutdown`](Self::shutdown) has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Stops accepting work, waits for workers to drain the backlog, and
    /// runs any job that slipped past the worker exit race inline.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let _guard = self.inner.idle_lock.lock();
            self.inner.idle_condvar.notify_all();
        }
        let handles = std::mem::take(&mut *self.threads.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("worker thread exited by panic during shutdown");
            }
        }
        let mut leftovers = 0usize;
        while let Some(job) = self.inner.queue.pop() {
            self.inner.pending.fetch_sub(1, Ordering::Relaxed);
            leftovers += 1;
            PoolInner::run_job(job);
        }
        if leftovers > 0 {
            debug!("ran {leftovers} leftover jobs inline during pool shutdown");
        }
    }
}

impl Executor for WorkerPool {
    fn try_execute(&self, job: Job) -> Result<(), Job> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(job);
        }
        self.inner.queue.push(job);
        self.inner.pending.fetch_add(1, Ordering::Relaxed);
        let _guard = self.inner.idle_lock.lock();
        self.inner.idle_condvar.notify_one();
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pending", &self.inner.pending.load(Ordering::Relaxed))
            .field("busy", &self.inner.busy.load(Ordering::Relaxed))
            .field("shutdown", &self.inner.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}
