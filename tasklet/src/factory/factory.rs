use crate::outcome::Failure;
use crate::schedule::Sched;
use crate::task::{Task, TaskInfo};
use crate::testing::{TestMeta, TestTask};

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

/// What a factory was declared as.
///
/// Registration managers dispatch on this instead of probing for marker
/// attributes.
#[derive(Debug, Clone)]
pub enum Kind {
    /// An ordinary coroutine.
    Plain,

    /// A hook, run before the tests of a suite.
    Hook,

    /// A test, with its reporting metadata.
    Test(TestMeta),
}

/// Creates a fresh [`Task`] per call from a computation-producing function.
///
/// The producer takes a single argument; use a tuple for several, and
/// `()` for none. Methods take `(owner, args)` and are turned into an
/// ordinary factory with [`bind`](Factory::bind).
#[derive(Clone)]
pub struct Factory<F> {
    /// Diagnostic identity shared with every task this factory creates.
    info: Arc<TaskInfo>,

    kind: Kind,

    /// The computation-producing function.
    producer: F,
}

impl<F> Factory<F> {
    /// Builds a factory from its identity and producer.
    pub(crate) fn new(info: Arc<TaskInfo>, kind: Kind, producer: F) -> Self {
        Self {
            info,
            kind,
            producer,
        }
    }

    /// What this factory produces.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Identity shared by every task this factory creates.
    pub fn info(&self) -> &Arc<TaskInfo> {
        &self.info
    }

    /// Function name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Name including the bound owner, e.g. `Dut.reset`.
    pub fn qualified_name(&self) -> &str {
        &self.info.qualname
    }

    /// Module the function was defined in.
    pub fn module(&self) -> &str {
        &self.info.module
    }

    /// The description, if any.
    pub fn description(&self) -> Option<&str> {
        self.info.description.as_deref()
    }

    /// Produces a new computation from `args` and wraps it in a new task
    /// driven by `sched`.
    ///
    /// The task is not started; hand it to the scheduler for that.
    pub fn call<A, Fut, T>(&self, sched: &Sched, args: A) -> Task<T>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        T: 'static,
    {
        Task::new(sched, self.info.clone(), (self.producer)(args))
    }

    /// Binds a method factory to its owner.
    ///
    /// The returned factory passes `(owner, args)` to this factory's
    /// producer. Its qualified name is `Owner.name`. Each call still
    /// creates exactly one task.
    pub fn bind<O, A, Fut, T>(&self, owner: O) -> Factory<impl Fn(A) -> Fut + Clone + use<F, O, A, Fut, T>>
    where
        F: Fn((O, A)) -> Fut + Clone,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        O: Clone,
        T: 'static,
    {
        let producer = self.producer.clone();
        Factory {
            info: bound_info::<O>(&self.info),
            kind: self.kind.clone(),
            producer: move |args: A| producer((owner.clone(), args)),
        }
    }

    /// The closure producing each body.
    pub(crate) fn producer(&self) -> &F {
        &self.producer
    }
}

/// Info for a method bound to an `O`.
pub(crate) fn bound_info<O>(info: &TaskInfo) -> Arc<TaskInfo> {
    Arc::new(TaskInfo {
        qualname: format!("{}.{}", owner_label(type_name::<O>()), info.name),
        ..info.clone()
    })
}

/// Short name of the owner type: `alloc::rc::Rc<bench::Dut>` becomes `Dut`.
fn owner_label(full: &'static str) -> &'static str {
    let inner = full.trim_end_matches('>');
    let inner = inner.rsplit('<').next().unwrap_or(inner);
    let inner = inner.rsplit("::").next().unwrap_or(inner);
    inner.trim_start_matches('&')
}

/// Factory for [`TestTask`]s.
///
/// Wraps an ordinary [`Factory`] whose kind is always [`Kind::Test`].
#[derive(Clone)]
pub struct TestFactory<F> {
    factory: Factory<F>,

    /// Same metadata as carried by the factory's [`Kind::Test`].
    meta: TestMeta,
}

impl<F> TestFactory<F> {
    /// Builds a test factory with its options.
    pub(crate) fn new(info: Arc<TaskInfo>, meta: TestMeta, producer: F) -> Self {
        Self {
            factory: Factory::new(info, Kind::Test(meta.clone()), producer),
            meta,
        }
    }

    /// The underlying factory.
    pub fn factory(&self) -> &Factory<F> {
        &self.factory
    }

    /// Test options fixed at definition.
    pub fn meta(&self) -> &TestMeta {
        &self.meta
    }

    /// The test function's name.
    pub fn name(&self) -> &str {
        self.factory.name()
    }

    /// Creates the test task for one run of this test.
    pub fn call<A, Fut, T>(&self, sched: &Sched, args: A) -> TestTask<T>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        T: Clone + 'static,
    {
        let body = (self.factory.producer())(args);
        TestTask::new(sched, self.factory.info().clone(), self.meta.clone(), body)
    }

    /// Binds a method test to its owner. See [`Factory::bind`].
    pub fn bind<O, A, Fut, T>(&self, owner: O) -> TestFactory<impl Fn(A) -> Fut + Clone + use<F, O, A, Fut, T>>
    where
        F: Fn((O, A)) -> Fut + Clone,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        O: Clone,
        T: 'static,
    {
        TestFactory {
            factory: self.factory.bind(owner),
            meta: self.meta.clone(),
        }
    }
}
