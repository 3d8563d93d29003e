use super::factory::{Factory, Kind, TestFactory};
use crate::outcome::Failure;
use crate::task::TaskInfo;
use crate::testing::{ExpectError, TestMeta};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Builder for a plain coroutine factory.
///
/// # Examples
///
/// ```rust,ignore
/// let factory = Coroutine::new("drive_clock")
///     .module("bench::clock")
///     .description("Toggles the clock forever")
///     .build(|period: Duration| async move { /* ... */ Ok(()) });
/// ```
#[derive(Debug, Clone)]
pub struct Coroutine {
    /// Function name.
    name: String,

    /// Declaring module path.
    module: String,

    /// Optional description.
    description: Option<String>,
}

impl Coroutine {
    /// Creates a builder for a coroutine called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: String::new(),
            description: None,
        }
    }

    /// Sets the declaring module, usually `module_path!()`.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Sets the description reported when a test starts.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Finishes the identity shared by every task the factory creates.
    pub(crate) fn info(self) -> Arc<TaskInfo> {
        Arc::new(TaskInfo {
            qualname: self.name.clone(),
            name: self.name,
            module: self.module,
            description: self.description,
        })
    }

    /// Builds the factory.
    ///
    /// `producer` must return a computation: a future resolving to
    /// `Result<T, Failure>`. Anything else is rejected here, when the
    /// factory is built, not when a task is first advanced.
    ///
    /// Methods take their owner as part of a tuple argument and are bound
    /// with [`Factory::bind`].
    ///
    /// ```compile_fail
    /// use tasklet::factory::Coroutine;
    ///
    /// let not_a_computation = Coroutine::new("f").build(|x: u32| x + 1);
    /// ```
    pub fn build<F, A, Fut, T>(self, producer: F) -> Factory<F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        T: 'static,
    {
        Factory::new(self.info(), Kind::Plain, producer)
    }
}

/// Builder for a hook: a coroutine run before any test of a suite.
#[derive(Debug, Clone)]
pub struct Hook {
    base: Coroutine,
}

impl Hook {
    /// Starts a hook named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: Coroutine::new(name),
        }
    }

    /// Sets the module path.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.base = self.base.module(module);
        self
    }

    /// Sets a one-line description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.base = self.base.description(description);
        self
    }

    /// Builds the hook factory from `producer`.
    pub fn build<F, A, Fut, T>(self, producer: F) -> Factory<F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        T: 'static,
    {
        Factory::new(self.base.info(), Kind::Hook, producer)
    }
}

/// Definition-order counter shared by every test factory in the process.
static NEXT_TEST_ID: AtomicU64 = AtomicU64::new(0);

/// Builder for a test.
///
/// Tests are coroutines with reporting metadata and an optional timeout.
/// Tests sort in the order their factories were built, within the
/// constraints of [`SortKey`](crate::testing::SortKey).
///
/// # Examples
///
/// ```rust,ignore
/// let test = Test::new("test_reset")
///     .module(module_path!())
///     .timeout(Duration::from_micros(10))
///     .stage(1)
///     .build(|dut: Dut| async move { /* ... */ Ok(()) });
/// ```
#[derive(Debug, Clone)]
pub struct Test {
    base: Coroutine,

    /// Simulated-time budget for the test body.
    timeout: Option<Duration>,

    /// Don't report a failure as a failure.
    expect_fail: bool,

    /// Failures that count as a pass.
    expect_error: ExpectError,

    /// Don't run the test at all.
    skip: bool,

    /// Logical stage the test belongs to.
    stage: Option<u32>,
}

impl Test {
    /// Starts a test named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: Coroutine::new(name),
            timeout: None,
            expect_fail: false,
            expect_error: ExpectError::None,
            skip: false,
            stage: None,
        }
    }

    /// Sets the module the test is collected from.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.base = self.base.module(module);
        self
    }

    /// Sets the description logged when the test starts.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.base = self.base.description(description);
        self
    }

    /// Fails the test with [`TaskError::Timeout`](crate::TaskError::Timeout)
    /// if its body runs longer than `after` of simulated time.
    ///
    /// Meant as protection against deadlock, not as a general-purpose
    /// timeout mechanism.
    pub fn timeout(mut self, after: Duration) -> Self {
        self.timeout = Some(after);
        self
    }

    /// Marks the test as expected to fail.
    pub fn expect_fail(mut self, expect_fail: bool) -> Self {
        self.expect_fail = expect_fail;
        self
    }

    /// Sets the failures that make the test pass.
    pub fn expect_error(mut self, expect_error: ExpectError) -> Self {
        self.expect_error = expect_error;
        self
    }

    /// Marks the test to be skipped by the runner.
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Puts the test in a stage. Tests sharing a stage sort together.
    pub fn stage(mut self, stage: u32) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Builds the test factory and assigns its definition-order id.
    pub fn build<F, A, Fut, T>(self, producer: F) -> TestFactory<F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        T: Clone + 'static,
    {
        let meta = TestMeta {
            id: NEXT_TEST_ID.fetch_add(1, Ordering::Relaxed),
            timeout: self.timeout,
            expect_fail: self.expect_fail,
            expect_error: self.expect_error,
            skip: self.skip,
            stage: self.stage,
        };

        TestFactory::new(self.base.info(), meta, producer)
    }
}
