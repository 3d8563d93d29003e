use crate::error::TaskError;
use crate::outcome::{Failure, Outcome};
use crate::request::{Payload, Resume};

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type Notify = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Slot {
    result: Option<Result<Box<dyn Any + Send>, Failure>>,

    /// Readiness hook installed by the scheduler.
    notify: Option<Notify>,

    /// Whether the writer side is gone.
    closed: bool,
}

/// Creates a connected writer/reader pair.
pub fn handoff() -> (Handoff, BlockingRequest) {
    let slot = Arc::new(Mutex::new(Slot::default()));
    (Handoff { slot: slot.clone() }, BlockingRequest { slot })
}

fn lock(slot: &Mutex<Slot>) -> std::sync::MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer side of a handoff, owned by the worker thread.
///
/// Written at most once: [`put`](Handoff::put) consumes it. Dropping it
/// without a `put` (a worker that died or was never spawned) stores
/// [`TaskError::WorkerLost`].
pub struct Handoff {
    slot: Arc<Mutex<Slot>>,
}

impl Handoff {
    /// Stores the worker's result and fires the readiness hook.
    pub fn put(self, result: Result<Box<dyn Any + Send>, Failure>) {
        self.store(result);
    }

    fn store(&self, result: Result<Box<dyn Any + Send>, Failure>) {
        let notify = {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return;
            }

            slot.closed = true;
            slot.result = Some(result);
            slot.notify.take()
        };

        // Outside the lock: the hook usually wakes the driving thread.
        if let Some(notify) = notify {
            notify();
        }
    }
}

impl Drop for Handoff {
    fn drop(&mut self) {
        self.store(Err(Failure::new(TaskError::WorkerLost)));
    }
}

impl fmt::Debug for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handoff").finish_non_exhaustive()
    }
}

/// Suspension request of a task waiting on blocking work.
///
/// The scheduler installs a readiness hook with
/// [`on_ready`](BlockingRequest::on_ready). Once it fires, the driving
/// thread calls [`take`](BlockingRequest::take) and advances the waiting
/// task with the returned resume value.
pub struct BlockingRequest {
    slot: Arc<Mutex<Slot>>,
}

impl BlockingRequest {
    /// Installs the readiness hook.
    ///
    /// The hook runs on the worker thread, once, when the result is
    /// stored; or immediately on this thread if it already is.
    pub fn on_ready(&self, notify: impl FnOnce() + Send + 'static) {
        {
            let mut slot = lock(&self.slot);
            if slot.result.is_none() {
                slot.notify = Some(Box::new(notify));
                return;
            }
        }

        notify();
    }

    /// Returns `true` once the worker has stored its result.
    pub fn is_ready(&self) -> bool {
        lock(&self.slot).result.is_some()
    }

    /// Takes the worker's result as a resume value.
    ///
    /// `None` until the worker is done, and after the first take.
    pub fn take(&self) -> Option<Resume> {
        let result = lock(&self.slot).result.take()?;
        Some(match result {
            Ok(value) => Outcome::Value(Payload::from_boxed(value)),
            Err(failure) => Outcome::Error(failure),
        })
    }
}

impl fmt::Debug for BlockingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingRequest")
            .field("ready", &self.is_ready())
            .finish()
    }
}
