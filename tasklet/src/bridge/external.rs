use super::handoff::handoff;
use super::pool::BlockingPool;
use crate::error::TaskError;
use crate::factory::bound_info;
use crate::outcome::{Failure, panic_message};
use crate::request::Request;
use crate::runtime::suspend::suspend;
use crate::task::TaskInfo;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::debug;

/// Blocking code callable from inside a task.
///
/// Awaiting [`call`](External::call) runs the wrapped function on a
/// [`BlockingPool`] thread while the calling task is suspended. The
/// scheduler keeps advancing other tasks in the meantime. The function
/// must not touch tasks itself; to re-enter the cooperative world from
/// it, use a [`Function`](super::Function).
///
/// # Examples
///
/// ```rust,ignore
/// let read_file = External::new("read_file", pool, |path: PathBuf| {
///     std::fs::read(&path).map_err(Failure::from)
/// });
///
/// let bytes = read_file.call(path).await?;
/// ```
pub struct External<F> {
    info: Arc<TaskInfo>,
    func: Arc<F>,
    pool: Arc<dyn BlockingPool>,
}

impl<F> External<F> {
    /// Wraps `func`, running each call on `pool`.
    pub fn new(name: impl Into<String>, pool: Arc<dyn BlockingPool>, func: F) -> Self {
        Self {
            info: TaskInfo::named(name),
            func: Arc::new(func),
            pool,
        }
    }

    /// The function's name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The name prefixed with the owner type once bound.
    pub fn qualified_name(&self) -> &str {
        &self.info.qualname
    }

    /// Runs the function with `args` on the pool and waits for it.
    ///
    /// The job is dispatched when the returned future is first polled.
    /// A panic in the function becomes [`TaskError::Panicked`]; a pool
    /// that drops the job yields [`TaskError::WorkerLost`].
    pub fn call<A, R>(&self, args: A) -> impl Future<Output = Result<R, Failure>> + use<F, A, R>
    where
        F: Fn(A) -> Result<R, Failure> + Send + Sync + 'static,
        A: Send + 'static,
        R: Send + 'static,
    {
        let func = self.func.clone();
        let pool = self.pool.clone();
        let info = self.info.clone();

        async move {
            let (writer, request) = handoff();

            debug!(target: "tasklet::bridge", name = %info.qualname, "dispatching blocking call");
            pool.execute(Box::new(move || {
                let result = match catch_unwind(AssertUnwindSafe(|| func(args))) {
                    Ok(Ok(value)) => Ok(Box::new(value) as Box<dyn Any + Send>),
                    Ok(Err(failure)) => Err(failure),
                    Err(payload) => Err(Failure::new(TaskError::Panicked {
                        message: panic_message(&*payload),
                    })),
                };

                writer.put(result);
            }));

            suspend::<R>(Request::new(request)).await
        }
    }

    /// Binds a method to its owner.
    ///
    /// The returned adapter passes `(owner, args)` to the wrapped
    /// function. Its qualified name is `Owner.name`.
    pub fn bind<O, A, R>(&self, owner: O) -> External<impl Fn(A) -> Result<R, Failure> + Send + Sync + use<F, O, A, R>>
    where
        F: Fn((O, A)) -> Result<R, Failure> + Send + Sync + 'static,
        O: Clone + Send + Sync + 'static,
    {
        let func = self.func.clone();
        External {
            info: bound_info::<O>(&self.info),
            func: Arc::new(move |args: A| func((owner.clone(), args))),
            pool: self.pool.clone(),
        }
    }
}

impl<F> Clone for External<F> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            func: self.func.clone(),
            pool: self.pool.clone(),
        }
    }
}

impl<F> fmt::Debug for External<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("External")
            .field("name", &self.info.qualname)
            .finish_non_exhaustive()
    }
}
