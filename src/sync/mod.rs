//! Lock-free primitives backing future completion.
//!
//! - [`CompletionSlot`]: a single-assignment cell; the first fill wins,
//!   every later attempt is a no-op.
//! - [`CallbackList`]: an append-until-drained callback queue that is
//!   drained exactly once; appends racing or following the drain still
//!   run their callback exactly once.
//!
//! Both are mutated exclusively through atomic compare-and-swap
//! operations; there are no blocking locks on the completion path.

pub mod callbacks;
pub mod slot;

pub use callbacks::CallbackList;
pub use slot::CompletionSlot;
