use crate::error::TaskError;
use crate::outcome::{Failure, Outcome};
use crate::request::Request;
use crate::runtime::context::CURRENT_MAILBOX;

use std::any::{Any, type_name};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Hands `request` to the scheduler and waits to be resumed.
///
/// The returned future suspends the current task exactly once. The task's
/// next advance delivers the scheduler's [`Resume`](crate::Resume): a
/// payload, which must be a `V`, or a failure, which is returned as
/// `Err` at this point.
///
/// A task has at most one outstanding request. Racing several requests is
/// the scheduler's business (see [`Schedule::first_of`](crate::Schedule::first_of)).
///
/// # Panics
///
/// Panics if polled outside of a task's advance.
///
/// # Examples
///
/// ```rust,ignore
/// let fired_at: Duration = suspend(sched.timer(Duration::from_nanos(10))).await?;
/// ```
pub fn suspend<V: Any>(request: Request) -> Suspend<V> {
    Suspend {
        request: Some(request),
        registered: false,
        _marker: PhantomData,
    }
}

/// A future that suspends the current task on a single [`Request`].
#[must_use = "a suspension does nothing unless awaited"]
pub struct Suspend<V> {
    /// The request, until it has been handed to the mailbox.
    request: Option<Request>,

    /// Whether the request has been handed over.
    registered: bool,

    _marker: PhantomData<fn() -> V>,
}

impl<V: Any> Future for Suspend<V> {
    type Output = Result<V, Failure>;

    /// Polls the suspension.
    ///
    /// The first poll registers the request and returns `Pending`. Later
    /// polls complete once the scheduler has stored a resume value.
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        CURRENT_MAILBOX.with(|cell| {
            let binding = cell.borrow();
            let mailbox = binding
                .as_ref()
                .expect("suspend polled outside of a task");

            if !this.registered {
                let mut slot = mailbox.request.borrow_mut();
                if slot.is_some() {
                    return Poll::Ready(Err(Failure::new(TaskError::DoubleSuspend)));
                }

                *slot = this.request.take();
                this.registered = true;
                return Poll::Pending;
            }

            match mailbox.resume.borrow_mut().take() {
                None => Poll::Pending,
                Some(Outcome::Error(failure)) => Poll::Ready(Err(failure)),
                Some(Outcome::Value(payload)) => Poll::Ready(payload.downcast::<V>().map_err(|_| {
                    Failure::new(TaskError::ResumeType {
                        expected: type_name::<V>(),
                    })
                })),
            }
        })
    }
}
