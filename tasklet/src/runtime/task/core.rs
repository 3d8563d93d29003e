use super::completion::Completion;
use super::handle::TaskHandle;
use super::join::Join;
use super::state::{TaskId, TaskInfo, TaskState};
use crate::config::config;
use crate::error::TaskError;
use crate::outcome::{Failure, Outcome, panic_message};
use crate::request::{Request, Resume};
use crate::runtime::context::{Mailbox, enter_task};
use crate::schedule::Sched;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use tracing::{Span, debug, debug_span};

/// The boxed computation of a task.
///
/// Bodies resolve to `Some(value)`; `None` is reserved for forwarding the
/// synthetic outcome of a killed task (see the timeout race).
pub(crate) type Body<T> = Pin<Box<dyn Future<Output = Result<Option<T>, Failure>>>>;

/// Result of a single [`advance`](Task::advance).
#[derive(Debug)]
pub enum Step {
    /// The computation is waiting on `request`. The scheduler decides what
    /// the request means and when to advance the task again.
    Suspended(Request),

    /// The computation terminated; the task's outcome is set and its
    /// completion callbacks have run.
    Completed,
}

/// A runnable unit of work driven by the scheduler.
///
/// `Runnable` erases the output type of a task so a scheduler can hold a
/// heterogeneous collection of `Box<dyn Runnable>`.
pub trait Runnable {
    fn id(&self) -> TaskId;

    fn qualified_name(&self) -> &str;

    /// Resumes the computation with `resume` and runs it to its next
    /// suspension or to completion.
    fn advance(&mut self, resume: Resume) -> Step;

    /// Forces completion without running any more of the body.
    fn kill(&mut self);

    fn is_completed(&self) -> bool;

    fn has_started(&self) -> bool;
}

/// State shared by a task and all of its handles.
pub(crate) struct Shared<T> {
    pub(crate) info: Arc<TaskInfo>,

    /// The computation. `None` once the task has completed, and briefly
    /// while it is being polled.
    pub(crate) body: RefCell<Option<Body<T>>>,

    /// Whether the task has been advanced at least once.
    pub(crate) started: Cell<bool>,

    /// Outcome and completion callbacks.
    pub(crate) completion: Rc<Completion<T>>,

    /// The scheduler driving this task.
    pub(crate) sched: Sched,

    /// Span keyed by the qualified name, created once per task.
    pub(crate) span: Span,
}

impl<T: 'static> Shared<T> {
    pub(crate) fn id(&self) -> TaskId {
        self.completion.id
    }

    pub(crate) fn state(&self) -> TaskState {
        if self.completion.is_set() {
            TaskState::Completed
        } else if self.started.get() {
            TaskState::Running
        } else {
            TaskState::Created
        }
    }

    /// Forces `outcome` onto the task unless it already completed.
    ///
    /// The body is dropped without being polled again and the scheduler is
    /// told to forget the task before any callback runs. Returns `false`
    /// if the task had already completed.
    pub(crate) fn force(&self, outcome: Outcome<Option<T>>) -> bool {
        if !self.completion.set(outcome) {
            return false;
        }

        self.sched.unschedule(self.id());

        let body = self.body.borrow_mut().take();
        drop(body);

        self.completion.fire();
        true
    }

    /// Kills the task. No-op once completed.
    pub(crate) fn kill(&self) {
        if self.completion.is_set() {
            return;
        }

        if config().scheduler_debug {
            debug!(target: "tasklet::task", parent: &self.span, "kill() called on task");
        }

        self.force(Outcome::Value(None));
    }
}

/// A cooperative task: one suspendable computation plus its one-shot
/// completion state.
///
/// The `Task` value is the only thing that can advance the computation.
/// Schedulers usually own it as a `Box<dyn Runnable>`; everyone else
/// observes or kills it through a [`TaskHandle`].
///
/// A task whose body produces `T` completes with:
/// - `Value(Some(v))` when the body returns `Ok(v)`,
/// - `Error(f)` when it returns `Err(f)` or panics,
/// - `Value(None)` when it is killed.
pub struct Task<T> {
    handle: TaskHandle<T>,

    /// Exchange slot between the computation's suspension points and
    /// [`advance`](Task::advance).
    mailbox: Rc<Mailbox>,
}

impl<T: 'static> Task<T> {
    /// Wraps `future` in a new task driven by `sched`.
    pub fn new<F>(sched: &Sched, info: Arc<TaskInfo>, future: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + 'static,
    {
        Self::from_body(sched, info, Box::pin(async move { future.await.map(Some) }))
    }

    /// Wraps `future` in a new task named `name`.
    pub fn named<F>(sched: &Sched, name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + 'static,
    {
        Self::new(sched, TaskInfo::named(name), future)
    }

    /// Wraps an already boxed body.
    pub(crate) fn from_body(sched: &Sched, info: Arc<TaskInfo>, body: Body<T>) -> Self {
        let id = TaskId::next();
        let span = debug_span!(target: "tasklet::task", "task", name = %info.qualname, %id);

        let shared = Rc::new(Shared {
            info,
            body: RefCell::new(Some(body)),
            started: Cell::new(false),
            completion: Rc::new(Completion::new(id)),
            sched: sched.clone(),
            span,
        });

        Self {
            handle: TaskHandle { shared },
            mailbox: Mailbox::new(),
        }
    }

    /// Advances the computation to its next suspension point.
    ///
    /// `resume` is delivered at the point where the computation is
    /// suspended: a value is returned from the pending
    /// [`suspend`](crate::suspend), a failure is raised there. The value
    /// passed to the very first advance is ignored (use
    /// [`Resume::start`](crate::Resume::start)); a failure passed to it
    /// completes the task before any of its body runs.
    ///
    /// Failures and panics escaping the computation are captured into the
    /// task's outcome; they never propagate out of this call.
    ///
    /// # Panics
    ///
    /// Panics if the task has already completed.
    pub fn advance(&mut self, resume: Resume) -> Step {
        let shared = &self.handle.shared;

        assert!(
            !shared.completion.is_set(),
            "advance() called on completed task {}",
            shared.info.qualname
        );

        let _entered = shared.span.enter();
        let first = !shared.started.replace(true);

        if config().scheduler_debug {
            debug!(target: "tasklet::task", first, "advancing task");
        }

        if first {
            if let Outcome::Error(failure) = resume {
                shared.body.borrow_mut().take();
                shared.completion.complete(Outcome::Error(failure));
                return Step::Completed;
            }
        } else {
            *self.mailbox.resume.borrow_mut() = Some(resume);
        }

        let taken = shared.body.borrow_mut().take();
        let Some(mut body) = taken else {
            // Body gone without an outcome.
            shared.completion.complete(Outcome::error(TaskError::NoSuspension));
            return Step::Completed;
        };

        let mut cx = Context::from_waker(Waker::noop());
        let polled = enter_task(self.mailbox.clone(), || {
            catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx)))
        });

        self.mailbox.resume.borrow_mut().take();
        let request = self.mailbox.request.borrow_mut().take();

        // Killed from inside its own body.
        if shared.completion.is_set() {
            return Step::Completed;
        }

        let outcome = match polled {
            Ok(Poll::Pending) => match request {
                Some(request) => {
                    *shared.body.borrow_mut() = Some(body);
                    return Step::Suspended(request);
                }
                None => Outcome::error(TaskError::NoSuspension),
            },
            Ok(Poll::Ready(result)) => Outcome::from_result(result),
            Err(payload) => Outcome::error(TaskError::Panicked {
                message: panic_message(&*payload),
            }),
        };

        drop(body);
        shared.completion.complete(outcome);
        Step::Completed
    }

    /// Returns a non-owning handle to this task.
    pub fn handle(&self) -> TaskHandle<T> {
        self.handle.clone()
    }

    /// Kills the task. See [`TaskHandle::kill`].
    pub fn kill(&self) {
        self.handle.kill()
    }

    /// Unique id of this task.
    pub fn id(&self) -> TaskId {
        self.handle.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.handle.state()
    }

    /// Returns `true` once the task has been advanced.
    pub fn has_started(&self) -> bool {
        self.handle.has_started()
    }

    /// Returns `true` once an outcome is recorded.
    pub fn is_completed(&self) -> bool {
        self.handle.is_completed()
    }

    /// The function name.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Name including the bound owner, e.g. `Dut.reset`.
    pub fn qualified_name(&self) -> &str {
        self.handle.qualified_name()
    }

    /// Module the task's function was defined in.
    pub fn module(&self) -> &str {
        self.handle.module()
    }

    /// The description given to the builder, if any.
    pub fn description(&self) -> Option<&str> {
        self.handle.description()
    }

    /// Name, module and description of the task.
    pub fn info(&self) -> &Arc<TaskInfo> {
        self.handle.info()
    }

    /// The span every event of this task is recorded under.
    pub(crate) fn span(&self) -> &Span {
        self.handle.span()
    }

    /// The scheduler this task was built for.
    pub(crate) fn sched(&self) -> &Sched {
        self.handle.sched()
    }
}

impl<T: Clone + 'static> Task<T> {
    /// See [`TaskHandle::join`].
    pub fn join(&self) -> Join<T> {
        self.handle.join()
    }

    /// See [`TaskHandle::retval`].
    pub fn retval(&self) -> Result<Option<T>, Failure> {
        self.handle.retval()
    }

    /// See [`TaskHandle::try_outcome`].
    pub fn try_outcome(&self) -> Result<Outcome<Option<T>>, TaskError> {
        self.handle.try_outcome()
    }
}

impl<T: 'static> Runnable for Task<T> {
    fn id(&self) -> TaskId {
        Task::id(self)
    }

    fn qualified_name(&self) -> &str {
        Task::qualified_name(self)
    }

    fn advance(&mut self, resume: Resume) -> Step {
        Task::advance(self, resume)
    }

    fn kill(&mut self) {
        Task::kill(self)
    }

    fn is_completed(&self) -> bool {
        Task::is_completed(self)
    }

    fn has_started(&self) -> bool {
        Task::has_started(self)
    }
}

impl<T> fmt::Display for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.handle.shared.info.qualname)
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.handle.shared.completion.id)
            .field("name", &self.handle.shared.info.qualname)
            .field("started", &self.handle.shared.started.get())
            .field("completed", &self.handle.shared.completion.is_set())
            .finish()
    }
}
