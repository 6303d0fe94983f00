//! The outcome of a completed computation.
//!
//! [`Outcome`] is the value every future eventually delivers to its
//! consumers: exactly one of a success value or an [`Error`]. It is
//! immutable once constructed and cheap to clone when `T` is.
//!
//! Transforms follow short-circuit rules: [`map`](Outcome::map) and
//! [`and_then`](Outcome::and_then) only touch the success branch and pass
//! failures through untouched; [`recover`](Outcome::recover) is the one
//! operation that turns a failure back into a success.

use crate::error::Error;

/// Either the value or the error of a finished computation.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The computation produced a value.
    Success(T),
    /// The computation failed.
    Failure(Error),
}

impl<T> Outcome<T> {
    /// Wraps a value.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Success(value)
    }

    /// Wraps an error.
    #[must_use]
    pub const fn failure(error: Error) -> Self {
        Self::Failure(error)
    }

    /// Returns true for the success branch.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for the failure branch.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The value, or `None` when this outcome is a failure.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The error, or `None` when this outcome is a success.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    /// Converts into a plain `Result`.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }

    /// Applies `f` to the success value; failures pass through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Applies an outcome-returning `f` to the success value; failures
    /// pass through.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Success(value) => f(value),
            Self::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Turns a failure into a success by applying `f` to the error;
    /// successes pass through.
    #[must_use]
    pub fn recover(self, f: impl FnOnce(Error) -> T) -> Self {
        match self {
            Self::Success(value) => Self::Success(value),
            Self::Failure(error) => Self::Success(f(error)),
        }
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(error),
        }
    }
}

impl<T> From<Outcome<T>> for Result<T, Error> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.into_result()
    }
}
