//! Error types for future completions.
//!
//! A failed future carries an [`Error`]: a [`ErrorKind`] plus an optional
//! message and an optional wrapped source. Errors are `Clone` because an
//! eager future replays its outcome to every subscriber, early or late.
//!
//! Taxonomy:
//!
//! - **Computation**: user code returned or raised an application failure
//! - **Panicked**: a transform, producer, or submitted closure panicked;
//!   the payload is captured as the error message
//! - **Timeout**: a scheduler deadline beat the primary computation, or a
//!   blocking `get_timeout` expired
//! - **Rejected**: an executor refused a job (pool shut down)
//! - **EmptyInput**: a combinator was handed zero futures
//! - **Internal**: a bug in this crate's bookkeeping

use core::fmt;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Application-level failure produced by user code.
    Computation,
    /// A user closure panicked; the panic was caught at the future boundary.
    Panicked,
    /// A deadline elapsed before a result arrived.
    Timeout,
    /// An executor refused the job, typically because it was shut down.
    Rejected,
    /// A combinator received an empty list of futures.
    EmptyInput,
    /// Invalid internal state.
    Internal,
}

impl ErrorKind {
    /// Returns a short human-readable name for the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Computation => "computation failed",
            Self::Panicked => "panicked",
            Self::Timeout => "timed out",
            Self::Rejected => "rejected",
            Self::EmptyInput => "empty input",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The error half of a future's outcome.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind and no message.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Attaches a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// A computation error with the given message.
    #[must_use]
    pub fn computation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Computation).with_message(message)
    }

    /// Wraps an application error as a computation failure.
    #[must_use]
    pub fn wrap(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::Computation).with_source(source)
    }

    /// Builds a panic error from a caught panic payload.
    ///
    /// `&str` and `String` payloads (the overwhelmingly common cases) are
    /// preserved verbatim; anything else is rendered opaquely.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// A timeout error for the named task after `duration`.
    #[must_use]
    pub fn timeout(description: &str, duration: Duration) -> Self {
        Self::new(ErrorKind::Timeout)
            .with_message(format!("'{description}' produced no result within {duration:?}"))
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the attached message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true if this error came from a deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if this error came from a caught panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }

    /// Returns true if an executor refused the work.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self.kind, ErrorKind::Rejected)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " (caused by: {source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err = Error::new(ErrorKind::Computation)
            .with_message("fetch failed")
            .with_source(io);
        let rendered = err.to_string();
        assert!(rendered.contains("computation failed"));
        assert!(rendered.contains("fetch failed"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn panic_payload_is_preserved() {
        let payload: Box<dyn Any + Send> = Box::new("index out of range".to_string());
        let err = Error::panicked(payload.as_ref());
        assert!(err.is_panic());
        assert_eq!(err.message(), Some("index out of range"));
    }

    #[test]
    fn timeout_predicate() {
        let err = Error::timeout("lookup", Duration::from_millis(10));
        assert!(err.is_timeout());
        assert!(!err.is_panic());
    }

    #[test]
    fn clone_keeps_source() {
        let err = Error::wrap(std::io::Error::new(std::io::ErrorKind::Other, "inner"));
        let copy = err.clone();
        assert!(std::error::Error::source(&copy).is_some());
    }
}
