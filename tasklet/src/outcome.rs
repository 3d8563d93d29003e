//! Captured results of computations.
//!
//! An [`Outcome`] is the terminal record of a computation: either the
//! value it produced or the [`Failure`] that escaped it. Outcomes are
//! also how the scheduler resumes a suspended task: a value to receive
//! at the suspension point, or a failure to raise there.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A captured failure.
///
/// `Failure` keeps the original error value so observers can test its
/// kind with [`is`](Failure::is) or [`downcast_ref`](Failure::downcast_ref).
/// Cloning is cheap; every clone refers to the same error, which is how a
/// single failure is surfaced verbatim to every joiner.
///
/// Like `anyhow::Error`, `Failure` deliberately does not implement
/// [`std::error::Error`], so any error type converts into it with `?`.
#[derive(Clone)]
pub struct Failure {
    inner: Arc<anyhow::Error>,
}

impl Failure {
    /// Wraps an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(anyhow::Error::new(error)),
        }
    }

    /// Creates a failure from a printable message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(anyhow::Error::msg(message)),
        }
    }

    /// Adopts an existing `anyhow` error, keeping its context chain.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Returns `true` if the failure was created from an `E`.
    pub fn is<E>(&self) -> bool
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.is::<E>()
    }

    /// Borrows the original error if it is an `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Returns `true` if both values refer to the same captured error.
    pub fn ptr_eq(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Iterates over the error and its sources.
    pub fn chain(&self) -> anyhow::Chain<'_> {
        self.inner.chain()
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Failure::new(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// Immutable result of a computation.
#[derive(Clone)]
pub enum Outcome<T> {
    /// The computation produced a value.
    Value(T),

    /// A failure escaped the computation.
    Error(Failure),
}

impl<T> Outcome<T> {
    /// Captures a value.
    pub fn value(payload: T) -> Self {
        Outcome::Value(payload)
    }

    /// Captures a failure.
    pub fn error(failure: impl Into<Failure>) -> Self {
        Outcome::Error(failure.into())
    }

    /// Builds an outcome from a `Result`.
    pub fn from_result(result: Result<T, Failure>) -> Self {
        match result {
            Ok(v) => Outcome::Value(v),
            Err(e) => Outcome::Error(e),
        }
    }

    /// Yields the payload, or propagates the failure to the caller.
    pub fn get(self) -> Result<T, Failure> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::Error(e) => Err(e),
        }
    }

    /// Borrows the payload.
    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Outcome::Value(v) => Outcome::Value(v),
            Outcome::Error(e) => Outcome::Error(e.clone()),
        }
    }

    /// Converts the payload, leaving failures untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Error(e) => Outcome::Error(e),
        }
    }

    /// Returns `true` for a value outcome.
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// Returns `true` for a failure outcome.
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    /// The captured failure, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Error(e) => Some(e),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Outcome::Error(e) => f
                .debug_tuple("Error")
                .field(&format_args!("{e}"))
                .finish(),
        }
    }
}

/// Value outcomes compare by payload; error outcomes compare by identity
/// of the captured failure.
impl<T: PartialEq> PartialEq for Outcome<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Outcome::Value(a), Outcome::Value(b)) => a == b,
            (Outcome::Error(a), Outcome::Error(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("Box<dyn Any>")
    }
}
