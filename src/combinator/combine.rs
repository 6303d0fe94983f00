//! Combining two or three heterogeneous futures with a user function.
//!
//! Each input is lifted into a positional container via `map`, the
//! containers are joined fail-fast, and the user function is applied to
//! the assembled values. The `_with` variants let the function itself
//! return a future (flat combination).

use super::join::all;
use crate::error::{Error, ErrorKind};
use crate::future::{EagerFuture, Promised};

/// One input's contribution to a two-way combination.
#[derive(Debug, Clone)]
struct PairSlot<A, B> {
    left: Option<A>,
    right: Option<B>,
}

/// One input's contribution to a three-way combination.
#[derive(Debug, Clone)]
struct TripleSlot<A, B, C> {
    first: Option<A>,
    second: Option<B>,
    third: Option<C>,
}

fn missing_slot<T: Clone + Send + Sync + 'static>() -> EagerFuture<T> {
    EagerFuture::from_error(
        Error::new(ErrorKind::Internal).with_message("combine lost an input slot"),
    )
}

fn lift_pair<A, B, FA, FB>(left: FA, right: FB) -> EagerFuture<Vec<Option<PairSlot<A, B>>>>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    FA: Promised<A>,
    FB: Promised<B>,
{
    let left = EagerFuture::adopt(&left).map(|value| PairSlot {
        left: Some(value),
        right: None,
    });
    let right = EagerFuture::adopt(&right).map(|value| PairSlot {
        left: None,
        right: Some(value),
    });
    all(true, vec![left, right])
}

fn take_pair<A, B>(mut slots: Vec<Option<PairSlot<A, B>>>) -> Option<(A, B)> {
    if slots.len() != 2 {
        return None;
    }
    let right = slots.pop().flatten()?.right?;
    let left = slots.pop().flatten()?.left?;
    Some((left, right))
}

/// Combines two futures with a value-returning function.
///
/// Fails fast: the first input failure becomes the combined failure and
/// the user function never runs.
pub fn combine<A, B, R, FA, FB, F>(left: FA, right: FB, f: F) -> EagerFuture<R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    FA: Promised<A>,
    FB: Promised<B>,
    F: FnOnce(A, B) -> R + Send + 'static,
{
    lift_pair(left, right).flat_map(move |slots| match take_pair(slots) {
        Some((a, b)) => EagerFuture::from_value(f(a, b)),
        None => missing_slot(),
    })
}

/// Combines two futures with a future-returning function.
pub fn combine_with<A, B, R, FA, FB, RF, F>(left: FA, right: FB, f: F) -> EagerFuture<R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    FA: Promised<A>,
    FB: Promised<B>,
    RF: Promised<R>,
    F: FnOnce(A, B) -> RF + Send + 'static,
{
    lift_pair(left, right).flat_map(move |slots| match take_pair(slots) {
        Some((a, b)) => EagerFuture::adopt(&f(a, b)),
        None => missing_slot(),
    })
}

fn lift_triple<A, B, C, FA, FB, FC>(
    first: FA,
    second: FB,
    third: FC,
) -> EagerFuture<Vec<Option<TripleSlot<A, B, C>>>>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    FA: Promised<A>,
    FB: Promised<B>,
    FC: Promised<C>,
{
    let first = EagerFuture::adopt(&first).map(|value| TripleSlot {
        first: Some(value),
        second: None,
        third: None,
    });
    let second = EagerFuture::adopt(&second).map(|value| TripleSlot {
        first: None,
        second: Some(value),
        third: None,
    });
    let third = EagerFuture::adopt(&third).map(|value| TripleSlot {
        first: None,
        second: None,
        third: Some(value),
    });
    all(true, vec![first, second, third])
}

fn take_triple<A, B, C>(mut slots: Vec<Option<TripleSlot<A, B, C>>>) -> Option<(A, B, C)> {
    if slots.len() != 3 {
        return None;
    }
    let c = slots.pop().flatten()?.third?;
    let b = slots.pop().flatten()?.second?;
    let a = slots.pop().flatten()?.first?;
    Some((a, b, c))
}

/// Combines three futures with a value-returning function.
pub fn combine3<A, B, C, R, FA, FB, FC, F>(
    first: FA,
    second: FB,
    third: FC,
    f: F,
) -> EagerFuture<R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    FA: Promised<A>,
    FB: Promised<B>,
    FC: Promised<C>,
    F: FnOnce(A, B, C) -> R + Send + 'static,
{
    lift_triple(first, second, third).flat_map(move |slots| match take_triple(slots) {
        Some((a, b, c)) => EagerFuture::from_value(f(a, b, c)),
        None => missing_slot(),
    })
}

/// Combines three futures with a future-returning function.
pub fn combine3_with<A, B, C, R, FA, FB, FC, RF, F>(
    first: FA,
    second: FB,
    third: FC,
    f: F,
) -> EagerFuture<R>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    FA: Promised<A>,
    FB: Promised<B>,
    FC: Promised<C>,
    RF: Promised<R>,
    F: FnOnce(A, B, C) -> RF + Send + 'static,
{
    lift_triple(first, second, third).flat_map(move |slots| match take_triple(slots) {
        Some((a, b, c)) => EagerFuture::adopt(&f(a, b, c)),
        None => missing_slot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::{LazyFuture, Promise};

    #[test]
    fn combines_heterogeneous_values() {
        let count = EagerFuture::from_value(3usize);
        let label = EagerFuture::from_value("item".to_string());
        let summary = combine(count, label, |n, s| format!("{n} x {s}"));
        assert_eq!(summary.get().unwrap(), "3 x item");
    }

    #[test]
    fn waits_for_the_slower_input() {
        let slow: Promise<i32> = Promise::new();
        let combined = combine(slow.future(), EagerFuture::from_value(10), |a, b| a + b);
        assert!(combined.peek().is_none());
        slow.set(1);
        assert_eq!(combined.get().unwrap(), 11);
    }

    #[test]
    fn input_failure_fails_the_combination() {
        let bad: EagerFuture<i32> = EagerFuture::from_error(Error::computation("left broke"));
        let combined = combine(bad, EagerFuture::from_value(2), |a, b| a + b);
        assert!(combined.get().is_err());
    }

    #[test]
    fn flat_combination_chains_into_a_future() {
        let combined = combine_with(
            EagerFuture::from_value(2),
            EagerFuture::from_value(3),
            |a, b| EagerFuture::from_value(a * b),
        );
        assert_eq!(combined.get().unwrap(), 6);
    }

    #[test]
    fn three_way_combination() {
        let combined = combine3(
            EagerFuture::from_value(1),
            EagerFuture::from_value(2),
            EagerFuture::from_value(3),
            |a, b, c| a + b + c,
        );
        assert_eq!(combined.get().unwrap(), 6);
    }

    #[test]
    fn lazy_inputs_combine_through_the_trait() {
        let combined = combine(
            LazyFuture::from_value(4),
            EagerFuture::from_value(5),
            |a, b| a + b,
        );
        assert_eq!(combined.get().unwrap(), 9);
    }
}
