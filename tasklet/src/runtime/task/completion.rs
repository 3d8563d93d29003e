use crate::outcome::Outcome;
use crate::task::TaskId;

use std::cell::RefCell;
use std::mem;

/// A completion callback.
pub(crate) type Callback = Box<dyn FnOnce()>;

/// Write-once outcome cell with its completion callbacks.
///
/// This is the only part of a task that joiners hold on to. It never
/// refers back to the computation, so any number of joiners can wait on a
/// task without keeping its body alive.
pub(crate) struct Completion<T> {
    pub(crate) id: TaskId,

    /// `Value(None)` is the synthetic outcome of a killed task.
    outcome: RefCell<Option<Outcome<Option<T>>>>,

    /// Callbacks in registration order, drained exactly once.
    callbacks: RefCell<Vec<Callback>>,
}

impl<T> Completion<T> {
    /// An unset cell for task `id`.
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            outcome: RefCell::new(None),
            callbacks: RefCell::new(Vec::new()),
        }
    }

    /// Returns `true` once an outcome is stored.
    pub(crate) fn is_set(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Stores the outcome without notifying anyone.
    ///
    /// Returns `false`, leaving the cell untouched, if an outcome was
    /// already stored.
    pub(crate) fn set(&self, outcome: Outcome<Option<T>>) -> bool {
        let mut slot = self.outcome.borrow_mut();
        if slot.is_some() {
            return false;
        }

        *slot = Some(outcome);
        true
    }

    /// Runs every registered callback, in registration order.
    ///
    /// The list is taken out before the first callback runs: a callback
    /// registering another one sees the outcome already set and runs
    /// immediately instead of re-entering the list.
    pub(crate) fn fire(&self) {
        let callbacks = mem::take(&mut *self.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    /// Stores the outcome and fires the callbacks.
    pub(crate) fn complete(&self, outcome: Outcome<Option<T>>) -> bool {
        if !self.set(outcome) {
            return false;
        }

        self.fire();
        true
    }

    /// Registers `callback`, or runs it now if the outcome is already set.
    pub(crate) fn on_complete(&self, callback: Callback) {
        if self.is_set() {
            callback();
        } else {
            self.callbacks.borrow_mut().push(callback);
        }
    }

    /// Runs `f` with the outcome, if set, without cloning it.
    pub(crate) fn with_outcome<R>(&self, f: impl FnOnce(Option<&Outcome<Option<T>>>) -> R) -> R {
        f(self.outcome.borrow().as_ref())
    }
}

impl<T: Clone> Completion<T> {
    /// A clone of the outcome, if set.
    pub(crate) fn outcome(&self) -> Option<Outcome<Option<T>>> {
        self.outcome.borrow().clone()
    }
}
