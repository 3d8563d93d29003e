//! The narrow capabilities a task needs from its driving scheduler.
//!
//! The scheduler itself (its main loop, timers and trigger combinators)
//! lives outside this crate. Tasks receive a [`Sched`] when they are
//! constructed and only ever talk to the scheduler through it; nothing in
//! the core looks a scheduler up from global state.

use crate::request::Request;
use crate::task::{Runnable, TaskId};

use std::rc::Rc;
use std::time::Duration;

/// Services provided by the driving scheduler.
///
/// All methods are called on the driving thread, usually from inside an
/// [`advance`](crate::task::Task::advance), `kill` or `abort`.
/// Implementations must therefore tolerate re-entrant calls and should not
/// hold borrows of their own state across a call into a task.
pub trait Schedule {
    /// Removes a task from the runnable set.
    ///
    /// Called when a task is killed or aborted. The task may be the one
    /// currently being advanced.
    fn unschedule(&self, id: TaskId);

    /// Adds a freshly created task to the runnable set.
    ///
    /// The scheduler takes ownership and will advance it with
    /// [`Resume::start`](crate::Resume::start) first.
    fn start(&self, task: Box<dyn Runnable>);

    /// Current simulated time.
    fn sim_time(&self) -> Duration;

    /// A request that resolves once `after` of simulated time has passed.
    fn timer(&self, after: Duration) -> Request;

    /// A request that resolves as soon as any of `requests` does.
    ///
    /// The task is resumed with the index of the winning request as a
    /// `usize` payload. The losing requests are abandoned.
    fn first_of(&self, requests: Vec<Request>) -> Request;
}

/// Shared handle to the driving scheduler, injected into every task.
pub type Sched = Rc<dyn Schedule>;

/// Work queued from another thread, run on the driving thread.
pub type Job = Box<dyn FnOnce(&Sched) + Send>;

/// Cross-thread entry point into the driving scheduler.
///
/// Used by the inbound bridge: foreign threads cannot touch tasks, so they
/// send a job that builds and starts the task on the driving thread.
pub trait Enqueue: Send + Sync {
    /// Queues `job`. Returns the job back if the scheduler is gone.
    fn enqueue(&self, job: Job) -> Result<(), Job>;

    /// Returns `true` on the thread that runs queued jobs.
    ///
    /// A caller on that thread must not block waiting for a queued job.
    fn on_driver_thread(&self) -> bool;
}
