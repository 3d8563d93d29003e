use super::capture::{CaptureHandle, Captures};
use super::meta::{ExpectError, SortKey, TestMeta};
use crate::error::TaskError;
use crate::outcome::{Failure, Outcome};
use crate::request::Resume;
use crate::runtime::suspend::suspend;
use crate::schedule::Sched;
use crate::task::{Body, Runnable, Step, Task, TaskHandle, TaskId, TaskInfo};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

/// Test bookkeeping shared by a [`TestTask`] and its handles.
struct TestState {
    meta: TestMeta,

    /// Wall-clock time of the first advance.
    start_time: Cell<Option<SystemTime>>,

    /// Simulated time of the first advance.
    start_sim_time: Cell<Option<Duration>>,

    capture: RefCell<Option<CaptureHandle>>,
}

impl TestState {
    fn stop_capture(&self) {
        if let Some(capture) = self.capture.borrow().as_ref() {
            capture.deactivate();
        }
    }
}

/// A task that runs a test.
///
/// Wraps a [`Task`] and records what a regression manager needs to run
/// and report the test. Created by [`TestFactory::call`](crate::TestFactory::call).
///
/// When the test has a timeout, the task does not run the test body
/// itself: it starts the body as a separate task and races its completion
/// against a timer. If the timer wins, the body is killed and the test
/// fails with [`TaskError::Timeout`].
pub struct TestTask<T> {
    task: Task<T>,
    state: Rc<TestState>,
}

impl<T: Clone + 'static> TestTask<T> {
    /// Wraps `body` as a test, racing it against the timeout if one is set.
    pub(crate) fn new<F>(sched: &Sched, info: Arc<TaskInfo>, meta: TestMeta, body: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + 'static,
    {
        let body: Body<T> = match meta.timeout {
            Some(after) => Box::pin(run_with_timeout(sched.clone(), info.clone(), body, after)),
            None => Box::pin(async move { body.await.map(Some) }),
        };

        let task = Task::from_body(sched, info, body);
        let state = Rc::new(TestState {
            meta,
            start_time: Cell::new(None),
            start_sim_time: Cell::new(None),
            capture: RefCell::new(None),
        });

        let weak = Rc::downgrade(&state);
        task.handle().on_complete(move || {
            if let Some(state) = weak.upgrade() {
                state.stop_capture();
            }
        });

        Self { task, state }
    }
}

impl<T: 'static> TestTask<T> {
    /// Advances the test. See [`Task::advance`].
    ///
    /// The first advance also records the start times, starts log capture
    /// and announces the test.
    pub fn advance(&mut self, resume: Resume) -> Step {
        if !self.task.has_started() && !self.task.is_completed() {
            self.begin();
        }

        self.task.advance(resume)
    }

    fn begin(&self) {
        self.state.start_time.set(Some(SystemTime::now()));
        self.state.start_sim_time.set(Some(self.task.sched().sim_time()));

        if let Some(capture) = self.state.capture.borrow().as_ref() {
            capture.activate();
        }

        let description = self.task.info().description.as_deref().unwrap_or("None");
        info!(
            target: "tasklet::test",
            parent: self.task.span(),
            "Starting test: \"{}\"\nDescription: {}",
            self.task.name(),
            description
        );
    }

    /// Records log events for this test into `captures`.
    ///
    /// Capture runs from the first advance until completion. Attaching a
    /// new capture replaces the previous one.
    pub fn capture_logs(&self, captures: &Captures) {
        let handle = captures.handle();
        if self.task.has_started() && !self.task.is_completed() {
            handle.activate();
        }

        self.state.capture.replace(Some(handle));
    }

    /// Returns a non-owning handle to this test.
    pub fn handle(&self) -> TestHandle<T> {
        TestHandle {
            task: self.task.handle(),
            state: self.state.clone(),
        }
    }

    /// The underlying task.
    pub fn task(&self) -> &Task<T> {
        &self.task
    }

    /// Fails the test. See [`TestHandle::abort`].
    pub fn abort(&self, failure: impl Into<Failure>) {
        self.handle().abort(failure)
    }

    /// Kills the test. See [`Task::kill`].
    pub fn kill(&self) {
        self.task.kill()
    }

    /// Id of the underlying task.
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    /// The test function's name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Returns `true` once the test has an outcome.
    pub fn is_completed(&self) -> bool {
        self.task.is_completed()
    }

    /// Test options fixed at definition.
    pub fn meta(&self) -> &TestMeta {
        &self.state.meta
    }

    /// Key ordering this test among its module's tests.
    pub fn sort_key(&self) -> SortKey {
        SortKey::new(&self.task.info().module, self.task.name(), &self.state.meta)
    }
}

impl<T: 'static> Runnable for TestTask<T> {
    fn id(&self) -> TaskId {
        self.task.id()
    }

    fn qualified_name(&self) -> &str {
        self.task.qualified_name()
    }

    fn advance(&mut self, resume: Resume) -> Step {
        TestTask::advance(self, resume)
    }

    fn kill(&mut self) {
        self.task.kill()
    }

    fn is_completed(&self) -> bool {
        self.task.is_completed()
    }

    fn has_started(&self) -> bool {
        self.task.has_started()
    }
}

impl<T> fmt::Display for TestTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.task, f)
    }
}

impl<T> fmt::Debug for TestTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestTask")
            .field("task", &self.task)
            .field("meta", &self.state.meta)
            .finish()
    }
}

/// A non-owning handle to a [`TestTask`].
pub struct TestHandle<T> {
    task: TaskHandle<T>,
    state: Rc<TestState>,
}

impl<T: 'static> TestHandle<T> {
    /// Fails the test with `failure` without running any more of its body.
    ///
    /// The test is removed from its scheduler and its completion callbacks
    /// fire.
    ///
    /// # Panics
    ///
    /// Panics if the test already completed. Unlike
    /// [`kill`](TestHandle::kill), aborting twice is a bug.
    pub fn abort(&self, failure: impl Into<Failure>) {
        assert!(
            !self.task.is_completed(),
            "abort() called on completed test {}",
            self.task.qualified_name()
        );

        let failure = failure.into();
        warn!(target: "tasklet::test", parent: self.task.span(), "test aborted: {failure}");
        self.task.force(Outcome::Error(failure));
    }

    /// Kills the test. See [`TaskHandle::kill`].
    pub fn kill(&self) {
        self.task.kill()
    }

    /// The underlying task handle.
    pub fn task(&self) -> &TaskHandle<T> {
        &self.task
    }

    /// Returns `true` once the test has an outcome.
    pub fn is_completed(&self) -> bool {
        self.task.is_completed()
    }

    /// Wall-clock time of the first advance.
    pub fn start_time(&self) -> Option<SystemTime> {
        self.state.start_time.get()
    }

    /// Simulated time of the first advance.
    pub fn start_sim_time(&self) -> Option<Duration> {
        self.state.start_sim_time.get()
    }

    /// Whether the runner should skip this test.
    pub fn skip(&self) -> bool {
        self.state.meta.skip
    }

    /// Whether a failure counts as a pass.
    pub fn expect_fail(&self) -> bool {
        self.state.meta.expect_fail
    }

    /// Failures that count as a pass.
    pub fn expect_error(&self) -> &ExpectError {
        &self.state.meta.expect_error
    }

    /// The test's stage, if staged.
    pub fn stage(&self) -> Option<u32> {
        self.state.meta.stage
    }

    /// Simulated-time limit, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.state.meta.timeout
    }

    /// All of the test's options.
    pub fn meta(&self) -> &TestMeta {
        &self.state.meta
    }

    /// Key ordering this test among its module's tests.
    pub fn sort_key(&self) -> SortKey {
        SortKey::new(&self.task.info().module, self.task.name(), &self.state.meta)
    }

    /// Log lines captured while the test ran.
    ///
    /// Empty if no capture was attached.
    ///
    /// # Panics
    ///
    /// Panics if the test has not completed.
    pub fn captured_logs(&self) -> Vec<String> {
        assert!(
            self.task.is_completed(),
            "test {} is not complete",
            self.task.qualified_name()
        );

        self.state
            .capture
            .borrow()
            .as_ref()
            .map(CaptureHandle::lines)
            .unwrap_or_default()
    }
}

impl<T: Clone + 'static> TestHandle<T> {
    /// See [`TaskHandle::retval`].
    pub fn retval(&self) -> Result<Option<T>, Failure> {
        self.task.retval()
    }

    /// See [`TaskHandle::try_outcome`].
    pub fn try_outcome(&self) -> Result<Outcome<Option<T>>, TaskError> {
        self.task.try_outcome()
    }
}

impl<T> Clone for TestHandle<T> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for TestHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHandle")
            .field("task", &self.task)
            .field("meta", &self.state.meta)
            .finish()
    }
}

/// Kills the body task if the race is dropped early.
struct KillOnDrop<T: 'static>(TaskHandle<T>);

impl<T: 'static> Drop for KillOnDrop<T> {
    fn drop(&mut self) {
        self.0.kill();
    }
}

/// Runs `body` as its own task and races it against a timer.
async fn run_with_timeout<T, F>(sched: Sched, info: Arc<TaskInfo>, body: F, after: Duration) -> Result<Option<T>, Failure>
where
    F: Future<Output = Result<T, Failure>> + 'static,
    T: Clone + 'static,
{
    let task = Task::new(&sched, info, body);
    let guard = KillOnDrop(task.handle());
    sched.start(Box::new(task));

    let body_done = guard.0.join_request();
    let winner: usize = suspend(sched.first_of(vec![body_done, sched.timer(after)])).await?;

    if winner == 0 {
        return match guard.0.try_outcome() {
            Ok(outcome) => outcome.get(),
            Err(err) => Err(err.into()),
        };
    }

    warn!(target: "tasklet::test", "test {} timed out after {:?}", guard.0.qualified_name(), after);
    Err(TaskError::Timeout { after }.into())
}
