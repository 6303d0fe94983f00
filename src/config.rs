//! Configuration for the crate's owned execution components.
//!
//! There is deliberately no process-wide default executor or scheduler:
//! callers construct [`WorkerPool`](crate::executor::WorkerPool) and
//! [`TimerScheduler`](crate::time::TimerScheduler) explicitly and pass
//! them where needed. These config structs only choose sizes and thread
//! names, with optional environment overrides:
//!
//! - `TANDEM_POOL_WORKERS` — worker thread count for [`PoolConfig`]
//! - `TANDEM_POOL_THREAD_PREFIX` — worker thread name prefix
//! - `TANDEM_TIMER_THREAD_NAME` — timer thread name

use crate::tracing_compat::warn;

/// Configuration for a [`WorkerPool`](crate::executor::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Prefix for worker thread names (`<prefix>-<index>`).
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            thread_name_prefix: "tandem-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Builds a config from the defaults plus environment overrides.
    ///
    /// Unparseable values are ignored with a warning rather than failing
    /// startup.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(workers) = read_usize(&lookup, "TANDEM_POOL_WORKERS") {
            if workers == 0 {
                warn!("TANDEM_POOL_WORKERS=0 ignored; keeping {}", config.workers);
            } else {
                config.workers = workers;
            }
        }
        if let Some(prefix) = lookup("TANDEM_POOL_THREAD_PREFIX") {
            if !prefix.is_empty() {
                config.thread_name_prefix = prefix;
            }
        }
        config
    }
}

/// Configuration for a [`TimerScheduler`](crate::time::TimerScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Name of the timer thread.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_name: "tandem-timer".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Builds a config from the defaults plus environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(name) = lookup("TANDEM_TIMER_THREAD_NAME") {
            if !name.is_empty() {
                config.thread_name = name;
            }
        }
        config
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
}

fn read_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparseable {key}={raw}");
            None
        }
    }
}
