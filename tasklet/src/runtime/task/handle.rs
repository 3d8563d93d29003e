use super::core::Shared;
use super::join::{Join, JoinRequest};
use super::state::{TaskId, TaskInfo, TaskState};
use crate::error::TaskError;
use crate::outcome::{Failure, Outcome};
use crate::request::Request;
use crate::schedule::Sched;

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::Span;

/// A non-owning handle to a task.
///
/// Handles can observe, join and kill a task but never advance it; only
/// the [`Task`](super::Task) value itself does that. Cloning a handle
/// yields another view of the same task.
pub struct TaskHandle<T> {
    /// Shared reference to the underlying task state.
    pub(crate) shared: Rc<Shared<T>>,
}

impl<T: 'static> TaskHandle<T> {
    /// Id of the task.
    pub fn id(&self) -> TaskId {
        self.shared.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.shared.state()
    }

    /// Returns `true` once the task has been advanced at least once.
    pub fn has_started(&self) -> bool {
        self.shared.started.get()
    }

    /// Returns `true` once an outcome is recorded.
    pub fn is_completed(&self) -> bool {
        self.shared.completion.is_set()
    }

    /// Returns `true` while the task has not completed.
    pub fn is_running(&self) -> bool {
        !self.is_completed()
    }

    /// Function name of the task.
    pub fn name(&self) -> &str {
        &self.shared.info.name
    }

    /// Name including the bound owner.
    pub fn qualified_name(&self) -> &str {
        &self.shared.info.qualname
    }

    /// Declaring module path.
    pub fn module(&self) -> &str {
        &self.shared.info.module
    }

    /// The task's description, if any.
    pub fn description(&self) -> Option<&str> {
        self.shared.info.description.as_deref()
    }

    /// Name, module and description of the task.
    pub fn info(&self) -> &Arc<TaskInfo> {
        &self.shared.info
    }

    /// Kills the task.
    ///
    /// If the task already completed this does nothing. Otherwise the task
    /// completes with the synthetic "no result" outcome `Value(None)`, is
    /// removed from its scheduler, and its completion callbacks fire. None
    /// of the remaining body runs: forced termination skips cleanup code,
    /// only destructors of the dropped computation execute.
    pub fn kill(&self) {
        self.shared.kill()
    }

    /// A suspension request that resolves when this task completes.
    ///
    /// Schedulers resolve it by registering a callback through
    /// [`JoinRequest::on_complete`] and resume the waiter with an empty
    /// payload. Mostly useful as an input to
    /// [`Schedule::first_of`](crate::Schedule::first_of).
    pub fn join_request(&self) -> Request {
        Request::new(JoinRequest::new(self.shared.completion.clone()))
    }

    /// Runs `f` against the outcome, if the task has completed.
    pub fn with_outcome<R>(&self, f: impl FnOnce(Option<&Outcome<Option<T>>>) -> R) -> R {
        self.shared.completion.with_outcome(f)
    }

    /// Registers a completion callback, or runs it now if already complete.
    pub(crate) fn on_complete(&self, callback: impl FnOnce() + 'static) {
        self.shared.completion.on_complete(Box::new(callback))
    }

    /// Forces `outcome` onto the task unless it already completed.
    pub(crate) fn force(&self, outcome: Outcome<Option<T>>) -> bool {
        self.shared.force(outcome)
    }

    /// The scheduler the task was built for.
    pub(crate) fn sched(&self) -> &Sched {
        &self.shared.sched
    }

    /// The task's span.
    pub(crate) fn span(&self) -> &Span {
        &self.shared.span
    }
}

impl<T: Clone + 'static> TaskHandle<T> {
    /// Returns a future resolving to the task's result once it completes.
    ///
    /// May be called any number of times, before or after completion; all
    /// joins resolve to the same outcome.
    pub fn join(&self) -> Join<T> {
        Join::new(self.shared.completion.clone())
    }

    /// The task's result.
    ///
    /// `Ok(Some(v))` for a returned value, `Ok(None)` for a killed task,
    /// `Err` for a failure.
    ///
    /// # Panics
    ///
    /// Panics if the task has not completed.
    pub fn retval(&self) -> Result<Option<T>, Failure> {
        match self.shared.completion.outcome() {
            Some(outcome) => outcome.get(),
            None => panic!("task {} is not complete", self.shared.info.qualname),
        }
    }

    /// The task's outcome, or [`TaskError::NotComplete`].
    pub fn try_outcome(&self) -> Result<Outcome<Option<T>>, TaskError> {
        self.shared.completion.outcome().ok_or(TaskError::NotComplete)
    }

    /// Registers `f` to receive the outcome on completion.
    ///
    /// The callback does not keep the task alive. If the task is dropped
    /// without completing, `f` is dropped without being called.
    pub(crate) fn on_outcome(&self, f: impl FnOnce(Outcome<Option<T>>) + 'static) {
        let completion = Rc::downgrade(&self.shared.completion);
        self.on_complete(move || {
            if let Some(outcome) = completion.upgrade().and_then(|c| c.outcome()) {
                f(outcome);
            }
        });
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> PartialEq for TaskHandle<T> {
    /// Handles are equal when they refer to the same task.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T> fmt::Display for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shared.info.qualname)
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.shared.completion.id)
            .field("name", &self.shared.info.qualname)
            .finish()
    }
}
