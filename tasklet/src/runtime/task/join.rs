use super::completion::{Callback, Completion};
use super::state::TaskId;
use crate::outcome::Failure;
use crate::request::Request;
use crate::runtime::suspend::{Suspend, suspend};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Type-erased view of a task's completion, as seen by a scheduler.
trait Joinable {
    fn id(&self) -> TaskId;

    fn is_completed(&self) -> bool;

    fn on_complete(&self, callback: Callback);
}

impl<T> Joinable for Completion<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn is_completed(&self) -> bool {
        self.is_set()
    }

    fn on_complete(&self, callback: Callback) {
        Completion::on_complete(self, callback)
    }
}

/// Suspension request emitted by [`Join`]: "resume me when this task
/// completes".
///
/// This is the one request type the core defines for the scheduler. A
/// scheduler resolves it by calling [`on_complete`](JoinRequest::on_complete)
/// and, when the callback fires, resuming the waiter with an empty payload.
pub struct JoinRequest {
    target: Rc<dyn Joinable>,
}

impl JoinRequest {
    /// A request completing when `completion` is set.
    pub(crate) fn new<T: 'static>(completion: Rc<Completion<T>>) -> Self {
        Self { target: completion }
    }

    /// Identity of the joined task.
    pub fn task_id(&self) -> TaskId {
        self.target.id()
    }

    /// Returns `true` once the joined task has finished.
    pub fn is_completed(&self) -> bool {
        self.target.is_completed()
    }

    /// Registers `callback` to run when the joined task completes.
    ///
    /// Callbacks run in registration order, synchronously inside the call
    /// that completes the task. If the task already completed, `callback`
    /// runs immediately.
    pub fn on_complete(&self, callback: impl FnOnce() + 'static) {
        self.target.on_complete(Box::new(callback))
    }
}

impl fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinRequest")
            .field("task", &self.target.id())
            .finish()
    }
}

/// A future resolving to a task's result.
///
/// Created by [`TaskHandle::join`](super::TaskHandle::join). Resolves
/// immediately if the task already completed; otherwise the awaiting task
/// suspends on a [`JoinRequest`].
#[must_use = "a join does nothing unless awaited"]
pub struct Join<T> {
    completion: Rc<Completion<T>>,
    pending: Option<Suspend<()>>,
}

impl<T> Join<T> {
    pub(crate) fn new(completion: Rc<Completion<T>>) -> Self {
        Self {
            completion,
            pending: None,
        }
    }
}

impl<T: Clone + 'static> Future for Join<T> {
    /// Same as [`TaskHandle::retval`](super::TaskHandle::retval).
    type Output = Result<Option<T>, Failure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            if let Some(outcome) = this.completion.outcome() {
                this.pending = None;
                return Poll::Ready(outcome.get());
            }

            let completion = this.completion.clone();
            let pending = this
                .pending
                .get_or_insert_with(|| suspend(Request::new(JoinRequest::new(completion))));

            match Pin::new(pending).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(failure)) => {
                    this.pending = None;
                    return Poll::Ready(Err(failure));
                }
                // Resumed; re-check and suspend again if the task is
                // somehow still running.
                Poll::Ready(Ok(())) => this.pending = None,
            }
        }
    }
}
