//! First-completion-wins racing.

use crate::error::{Error, ErrorKind};
use crate::future::{EagerFuture, Promise, Promised};

/// Completes with whichever input completes first, success or failure;
/// every later completion is discarded.
///
/// The tie-break is the shared promise's single-assignment slot: the
/// first compare-and-swap wins. Losing computations keep running — this
/// crate never interrupts them — their results just have nowhere to go.
///
/// An empty input fails with [`ErrorKind::EmptyInput`], since no winner
/// could ever arrive.
pub fn any<T, F>(futures: Vec<F>) -> EagerFuture<T>
where
    T: Clone + Send + Sync + 'static,
    F: Promised<T>,
{
    if futures.is_empty() {
        return EagerFuture::from_error(
            Error::new(ErrorKind::EmptyInput).with_message("any() needs at least one future"),
        );
    }
    let promise = Promise::new();
    for future in futures {
        let target = promise.clone();
        future.consume(Box::new(move |outcome| {
            target.complete(outcome);
        }));
    }
    promise.future()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_completion_wins() {
        let slow: Promise<i32> = Promise::new();
        let winner = any(vec![slow.future(), EagerFuture::from_value(1)]);
        assert_eq!(winner.get().unwrap(), 1);
        // The straggler's completion is discarded.
        slow.set(2);
        assert_eq!(winner.get().unwrap(), 1);
    }

    #[test]
    fn a_failure_can_win() {
        let pending: Promise<i32> = Promise::new();
        let winner = any(vec![
            pending.future(),
            EagerFuture::from_error(Error::computation("fast failure")),
        ]);
        assert!(winner.get().is_err());
    }

    #[test]
    fn empty_input_fails() {
        let winner: EagerFuture<i32> = any(Vec::<EagerFuture<i32>>::new());
        assert_eq!(winner.get().unwrap_err().kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn mixed_future_variants_race_through_the_trait() {
        let eager: Box<dyn Promised<i32>> = Box::new(EagerFuture::from_value(5));
        let lazy: Box<dyn Promised<i32>> = Box::new(crate::future::LazyFuture::from_value(6));
        let winner = any(vec![eager, lazy]);
        let value = winner.get().unwrap();
        assert!(value == 5 || value == 6);
    }
}
