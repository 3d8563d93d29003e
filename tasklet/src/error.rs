//! Errors produced by the task core itself.
//!
//! User computations fail with whatever error type they like; those are
//! carried verbatim inside a [`Failure`](crate::Failure). The variants
//! below are the failures the core manufactures on its own: timeouts,
//! caught panics, protocol misuse by a computation, and bridge breakage.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by the task machinery rather than by a task body.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A test did not finish within its configured simulated-time budget.
    #[error("test timed out after {after:?} of simulated time")]
    Timeout {
        /// The timeout that was exceeded.
        after: Duration,
    },

    /// The computation panicked while being advanced.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The computation returned `Pending` without handing a suspension
    /// request to the scheduler (it awaited a foreign future).
    #[error("computation suspended without a suspension request")]
    NoSuspension,

    /// The computation tried to register a second suspension request
    /// within a single advance.
    #[error("computation registered more than one suspension request")]
    DoubleSuspend,

    /// The scheduler resumed the computation with a payload of the wrong type.
    #[error("resumed with an unexpected payload, expected `{expected}`")]
    ResumeType {
        /// Name of the type the suspension point expected.
        expected: &'static str,
    },

    /// A blocking worker went away without producing a result.
    #[error("blocking worker exited without producing a result")]
    WorkerLost,

    /// The driving scheduler dropped an inbound call before running it.
    #[error("scheduler dropped the call before it completed")]
    SchedulerGone,

    /// A result was requested from a task that has not completed.
    #[error("task is not complete")]
    NotComplete,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::NoSuspension => "task_no_suspension",
            TaskError::DoubleSuspend => "task_double_suspend",
            TaskError::ResumeType { .. } => "task_resume_type",
            TaskError::WorkerLost => "bridge_worker_lost",
            TaskError::SchedulerGone => "bridge_scheduler_gone",
            TaskError::NotComplete => "task_not_complete",
        }
    }

    /// Returns `true` for the failure produced by a test timeout race.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }
}
