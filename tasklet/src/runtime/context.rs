use crate::request::{Request, Resume};

use std::cell::RefCell;
use std::rc::Rc;

/// The exchange slot between a task and its suspension points.
///
/// A task owns exactly one mailbox. While the task is being advanced,
/// the mailbox is installed as the thread's current task so that
/// [`suspend`](crate::suspend) can reach it without being handed a
/// reference.
#[derive(Default)]
pub(crate) struct Mailbox {
    /// Request registered by the computation during the current advance.
    pub(crate) request: RefCell<Option<Request>>,

    /// Resume value delivered by the scheduler for the current advance.
    pub(crate) resume: RefCell<Option<Resume>>,
}

impl Mailbox {
    /// An empty mailbox.
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }
}

thread_local! {
    /// Mailbox of the task currently being advanced on this thread.
    ///
    /// Set for the duration of a single advance and restored afterwards.
    pub(crate) static CURRENT_MAILBOX: RefCell<Option<Rc<Mailbox>>> =
        const { RefCell::new(None) };
}

/// Installs `mailbox` as the current task's slot for the duration of `f`.
///
/// The previous slot is restored afterwards. `f` must not unwind; callers
/// catch panics inside it.
pub(crate) fn enter_task<R>(mailbox: Rc<Mailbox>, f: impl FnOnce() -> R) -> R {
    CURRENT_MAILBOX.with(|cell| {
        let prev = cell.replace(Some(mailbox));

        let out = f();

        cell.replace(prev);

        out
    })
}

/// Returns `true` when called from inside a task's advance.
pub fn in_task() -> bool {
    CURRENT_MAILBOX.with(|cell| cell.borrow().is_some())
}
