use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::warn;

/// Runs blocking jobs off the driving thread.
///
/// Jobs own the writer side of a [`Handoff`](super::Handoff). A pool that
/// drops a job without running it therefore resolves the waiting task
/// with [`TaskError::WorkerLost`](crate::TaskError::WorkerLost) instead of
/// leaving it suspended forever.
pub trait BlockingPool: Send + Sync {
    fn execute(&self, job: Box<dyn FnOnce() + Send>);
}

/// Spawns a fresh OS thread for every job.
///
/// Threads are named `tasklet-external-N`.
#[derive(Default)]
pub struct ThreadPerCall {
    spawned: AtomicUsize,
}

impl ThreadPerCall {
    /// Creates a pool with no threads spawned yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads spawned so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl BlockingPool for ThreadPerCall {
    fn execute(&self, job: Box<dyn FnOnce() + Send>) {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let spawned = thread::Builder::new()
            .name(format!("tasklet-external-{n}"))
            .spawn(job);

        // The job, and the handoff inside it, is dropped with the error.
        if let Err(err) = spawned {
            warn!(target: "tasklet::bridge", "failed to spawn blocking worker: {err}");
        }
    }
}

impl fmt::Debug for ThreadPerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPerCall")
            .field("spawned", &self.spawned())
            .finish()
    }
}
