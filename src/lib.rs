//! Tandem: composable eager/lazy futures with racing, quorum, and hedged
//! dispatch.
//!
//! # Overview
//!
//! Tandem is a callback-driven concurrency core for services that juggle
//! many in-flight computations: RPC fan-outs, cache lookups, proxy
//! pipelines. It is built on one abstraction — a *composable future* — in
//! two completion flavors:
//!
//! - [`EagerFuture`]: runs its producer once, memoizes the outcome in a
//!   lock-free single-assignment slot, and replays it to every
//!   subscriber.
//! - [`LazyFuture`]: stores only its producer and re-runs it per
//!   subscriber; composition is free until somebody consumes.
//!
//! Combinators ([`combinator`]) work over either variant through the
//! [`Promised`] trait: racing, fail-fast joins, best-N-of-M quorums,
//! deadline capping, speculative double dispatch, and bounded retry.
//!
//! # Core guarantees
//!
//! - **Single assignment**: a future completes exactly once; the first
//!   completion wins a compare-and-swap and the rest are no-ops.
//! - **Exactly-once callbacks**: every registered consumer runs once,
//!   whether it registered before or after completion; a panicking
//!   consumer is logged and suppressed, never re-thrown into the
//!   completing thread.
//! - **No hidden runtime**: work runs on the completing thread unless a
//!   future was given a dispatch [`Executor`]; the only blocking calls
//!   are `get`/`get_timeout`.
//! - **No loser cancellation**: racing combinators discard a loser's
//!   result but never interrupt its computation — racing actions must be
//!   idempotent.
//!
//! # Example
//!
//! ```rust
//! use tandem::{EagerFuture, combinator};
//!
//! let doubled = EagerFuture::from_value(21).map(|v| v * 2);
//! assert_eq!(doubled.get().unwrap(), 42);
//!
//! let sum = combinator::combine(
//!     EagerFuture::from_value(2),
//!     EagerFuture::from_value(3),
//!     |a, b| a + b,
//! );
//! assert_eq!(sum.get().unwrap(), 5);
//! ```
//!
//! # Module structure
//!
//! - [`outcome`]: the success/failure record every future delivers
//! - [`error`]: error kinds and the crate's [`Error`] type
//! - [`future`]: the [`Promised`] trait and both future variants
//! - [`sync`]: the single-assignment slot and callback queue underneath
//! - [`combinator`]: N-ary composition (race, join, quorum, timeout,
//!   hedge, retry)
//! - [`executor`]: the dispatch [`Executor`] trait and [`WorkerPool`]
//! - [`time`]: the [`Scheduler`] trait, [`TimerScheduler`], and
//!   cancellation tokens for delayed tasks
//! - [`config`]: sizing/naming for the owned components
//! - [`tracing_compat`]: optional structured logging

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]

pub mod combinator;
pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod outcome;
pub mod sync;
pub mod time;
pub mod tracing_compat;

// Re-exports for convenient access to core types
pub use config::{PoolConfig, SchedulerConfig};
pub use error::{Error, ErrorKind, Result};
pub use executor::{Executor, Job, RejectedError, WorkerPool};
pub use future::{Consumer, EagerFuture, LazyFuture, Producer, Promise, Promised};
pub use outcome::Outcome;
pub use time::{CancelToken, Scheduler, TimerScheduler};
