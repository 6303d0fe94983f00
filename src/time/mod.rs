//! Delayed execution for timeouts and speculative dispatch.
//!
//! The [`Scheduler`] trait is the crate's only "run this later" surface,
//! and its [`CancelToken`] is the crate's only cancellation surface:
//! tokens cancel a *pending* delayed task (e.g. a timeout that lost its
//! race) and never reach into a computation that already started.

pub mod scheduler;

pub use scheduler::{CancelToken, Scheduler, TimerScheduler};
