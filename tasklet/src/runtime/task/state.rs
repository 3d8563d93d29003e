use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created but never advanced.
    Created,

    /// Advanced at least once; no outcome yet.
    Running,

    /// The outcome is set. Absorbing: nothing leaves this state.
    Completed,
}

/// Identity of a task, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates the next process-wide id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Diagnostic identity shared by a factory and every task it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Function name.
    pub name: String,

    /// Qualified name (`Owner.name` for bound methods).
    pub qualname: String,

    /// Declaring module path.
    pub module: String,

    /// Free-form description, shown when a test starts.
    pub description: Option<String>,
}

impl TaskInfo {
    /// Info for an ad-hoc task with no declaring module.
    pub fn named(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            qualname: name.clone(),
            name,
            module: String::new(),
            description: None,
        })
    }
}
