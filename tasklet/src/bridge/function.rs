use crate::error::TaskError;
use crate::factory::Factory;
use crate::outcome::{Failure, Outcome};
use crate::runtime::context::in_task;
use crate::schedule::{Enqueue, Job, Sched};

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::debug;

/// Where a blocked caller waits for its task.
struct Rendezvous<T> {
    result: Mutex<Option<Result<Option<T>, Failure>>>,
    ready: Condvar,
}

impl<T> Rendezvous<T> {
    fn wait(&self) -> Result<Option<T>, Failure> {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = slot.take() {
                return result;
            }

            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Sending side of a [`Rendezvous`].
///
/// Dropped unsent, it reports [`TaskError::SchedulerGone`]: the job was
/// refused, or the task was dropped before it completed.
struct Reply<T> {
    rendezvous: Option<Arc<Rendezvous<T>>>,
}

impl<T> Reply<T> {
    fn send(mut self, result: Result<Option<T>, Failure>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<Option<T>, Failure>) {
        if let Some(rendezvous) = self.rendezvous.take() {
            *rendezvous.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
            rendezvous.ready.notify_one();
        }
    }
}

impl<T> Drop for Reply<T> {
    fn drop(&mut self) {
        self.deliver(Err(Failure::new(TaskError::SchedulerGone)));
    }
}

/// A task callable from a foreign thread.
///
/// [`call`](Function::call) queues a job with the scheduler; on the
/// driving thread the job creates a fresh task from the factory and
/// starts it. The calling thread blocks until that task completes.
///
/// # Examples
///
/// ```rust,ignore
/// let poke = Function::new(poke_factory, remote);
///
/// // On a worker thread, e.g. inside an External:
/// let value = poke.call((addr, data))?;
/// ```
pub struct Function<F> {
    factory: Factory<F>,
    enqueue: Arc<dyn Enqueue>,
}

impl<F> Function<F> {
    /// Wraps `factory`, queueing its calls through `enqueue`.
    pub fn new(factory: Factory<F>, enqueue: Arc<dyn Enqueue>) -> Self {
        Self { factory, enqueue }
    }

    /// The factory each call instantiates.
    pub fn factory(&self) -> &Factory<F> {
        &self.factory
    }

    /// Runs a fresh task on the driving thread and waits for its result.
    ///
    /// Returns `Ok(Some(v))` for a returned value, `Ok(None)` if the task
    /// was killed, and the task's failure otherwise. If the scheduler is
    /// gone, returns [`TaskError::SchedulerGone`].
    ///
    /// # Panics
    ///
    /// Panics if called from inside a task, or from the driving thread
    /// outside any task. The job can only run on the driving thread, so
    /// blocking there would never return.
    pub fn call<A, Fut, T>(&self, args: A) -> Result<Option<T>, Failure>
    where
        F: Fn(A) -> Fut + Clone + Send + 'static,
        A: Send + 'static,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        T: Clone + Send + 'static,
    {
        assert!(
            !in_task(),
            "Function::call() for {} invoked from inside a task",
            self.factory.qualified_name()
        );
        assert!(
            !self.enqueue.on_driver_thread(),
            "Function::call() for {} invoked on the driving thread",
            self.factory.qualified_name()
        );

        let rendezvous = Arc::new(Rendezvous {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });
        let reply = Reply {
            rendezvous: Some(rendezvous.clone()),
        };

        let factory = self.factory.clone();
        let job: Job = Box::new(move |sched: &Sched| {
            let task = factory.call(sched, args);
            debug!(target: "tasklet::bridge", name = %task.qualified_name(), id = %task.id(), "starting inbound call");

            task.handle().on_outcome(move |outcome: Outcome<Option<T>>| reply.send(outcome.get()));
            sched.start(Box::new(task));
        });

        // A refused job drops its reply, which reports SchedulerGone.
        if let Err(job) = self.enqueue.enqueue(job) {
            drop(job);
        }

        rendezvous.wait()
    }

    /// Binds a method to its owner. See [`Factory::bind`].
    pub fn bind<O, A, Fut, T>(&self, owner: O) -> Function<impl Fn(A) -> Fut + Clone + use<F, O, A, Fut, T>>
    where
        F: Fn((O, A)) -> Fut + Clone,
        Fut: Future<Output = Result<T, Failure>> + 'static,
        O: Clone,
        T: 'static,
    {
        Function {
            factory: self.factory.bind(owner),
            enqueue: self.enqueue.clone(),
        }
    }
}

impl<F: Clone> Clone for Function<F> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            enqueue: self.enqueue.clone(),
        }
    }
}

impl<F> fmt::Debug for Function<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.factory.qualified_name())
            .finish_non_exhaustive()
    }
}
