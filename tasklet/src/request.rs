//! Opaque values exchanged between a task and its scheduler.
//!
//! A suspended task hands its scheduler a [`Request`]; the scheduler later
//! resumes it with a [`Resume`], an [`Outcome`] wrapping a [`Payload`].
//! The core never looks inside a request it did not create itself.

use crate::outcome::Outcome;

use std::any::{Any, type_name};
use std::fmt;

/// A suspension request: "resume me once this has happened".
///
/// Requests are type-erased. Schedulers inspect them with
/// [`is`](Request::is), [`downcast_ref`](Request::downcast_ref) and
/// [`downcast`](Request::downcast) for the request types they understand.
pub struct Request {
    inner: Box<dyn Any>,
    kind: &'static str,
}

impl Request {
    /// Wraps a scheduler-specific request value.
    pub fn new<R: Any>(request: R) -> Self {
        Self {
            inner: Box::new(request),
            kind: type_name::<R>(),
        }
    }

    /// Returns `true` if the request holds an `R`.
    pub fn is<R: Any>(&self) -> bool {
        self.inner.is::<R>()
    }

    /// Borrows the wrapped request if it is an `R`.
    pub fn downcast_ref<R: Any>(&self) -> Option<&R> {
        self.inner.downcast_ref::<R>()
    }

    /// Takes the request value out, or gives the request back unchanged.
    pub fn downcast<R: Any>(self) -> Result<R, Request> {
        let kind = self.kind;
        match self.inner.downcast::<R>() {
            Ok(r) => Ok(*r),
            Err(inner) => Err(Request { inner, kind }),
        }
    }

    /// Type name of the wrapped request, for diagnostics.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Request").field(&self.kind).finish()
    }
}

/// The value a scheduler delivers to a resumed task.
pub struct Payload {
    inner: Box<dyn Any>,
}

impl Payload {
    /// Wraps a resume value.
    pub fn new<V: Any>(value: V) -> Self {
        Self {
            inner: Box::new(value),
        }
    }

    /// A payload carrying nothing, used for the first advance and for
    /// requests that only signal readiness.
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Adopts an already boxed value, as produced by a blocking worker.
    pub fn from_boxed(value: Box<dyn Any + Send>) -> Self {
        Self { inner: value }
    }

    /// Returns `true` if the payload holds a `V`.
    pub fn is<V: Any>(&self) -> bool {
        self.inner.is::<V>()
    }

    /// Takes the value out, or gives the payload back unchanged.
    pub fn downcast<V: Any>(self) -> Result<V, Payload> {
        match self.inner.downcast::<V>() {
            Ok(v) => Ok(*v),
            Err(inner) => Err(Payload { inner }),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// What a task is resumed with: a payload, or a failure to raise at the
/// suspension point.
pub type Resume = Outcome<Payload>;

impl Outcome<Payload> {
    /// The resume value for the very first advance of a task.
    pub fn start() -> Self {
        Outcome::Value(Payload::empty())
    }

    /// Resumes with `value`.
    pub fn with<V: Any>(value: V) -> Self {
        Outcome::Value(Payload::new(value))
    }
}
