//! N-ary composition over futures.
//!
//! Every combinator here operates through the
//! [`Promised`](crate::future::Promised) trait, so eager and lazy
//! futures (and boxed mixtures of both) compose interchangeably. The
//! output is always an eager future: completions race into one
//! single-assignment slot.
//!
//! - [`any`]: first completion wins, success or failure
//! - [`all`]: wait for everything, optionally failing fast
//! - [`first`]: best-N-of-M, optionally deadline-capped
//!   ([`first_within`])
//! - [`combine`] / [`combine3`]: lift two or three heterogeneous futures
//!   into one user function
//! - [`with_timeout`]: race a future against a scheduled deadline
//! - [`double_dispatch`]: speculatively re-issue a slow action
//! - [`retry`]: bounded re-invocation on failure

pub mod combine;
pub mod hedge;
pub mod join;
pub mod quorum;
pub mod race;
pub mod retry;
pub mod timeout;

pub use combine::{combine, combine3, combine3_with, combine_with};
pub use hedge::double_dispatch;
pub use join::{all, all_within};
pub use quorum::{Status, first, first_within};
pub use race::any;
pub use retry::{retry, retry_with_timeout};
pub use timeout::{with_timeout, with_timeout_described};
