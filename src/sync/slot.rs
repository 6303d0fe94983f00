//! Single-assignment completion slot.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const FILLING: u8 = 1;
const FILLED: u8 = 2;

/// A cell that transitions empty -> filled at most once.
///
/// The winning filler is decided by a compare-and-swap on the state byte;
/// losers observe `false` and their value is dropped. Readers only see
/// the value after the `FILLED` store, so a `Some` from [`get`](Self::get)
/// is always the final value.
#[derive(Debug)]
pub struct CompletionSlot<T> {
    state: AtomicU8,
    value: OnceLock<T>,
}

impl<T> CompletionSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: OnceLock::new(),
        }
    }

    /// Attempts to fill the slot; returns whether this caller won.
    pub fn fill(&self, value: T) -> bool {
        match self
            .state
            .compare_exchange(EMPTY, FILLING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                let _ = self.value.set(value);
                self.state.store(FILLED, Ordering::Release);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the final value once the fill is complete.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == FILLED {
            self.value.get()
        } else {
            None
        }
    }

    /// Returns true once a fill has fully completed.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.state.load(Ordering::Acquire) == FILLED
    }
}

impl<T> Default for CompletionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
