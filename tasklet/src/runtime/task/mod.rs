//! Cooperative task primitives.
//!
//! This module defines the wrapper around a single suspendable
//! computation:
//! - [`Task`], the owning wrapper the scheduler advances,
//! - [`TaskHandle`], the clonable view used to join, kill and inspect,
//! - [`Join`] and [`JoinRequest`], the completion trigger,
//! - [`Runnable`], the object-safe interface a scheduler drives.
//!
//! Most users create tasks through a [`Factory`](crate::factory::Factory)
//! rather than constructing them directly.

pub(crate) mod completion;
pub(crate) mod handle;
pub(crate) mod join;
pub(crate) mod state;

pub mod core;

pub use self::core::{Runnable, Step, Task};
pub use handle::TaskHandle;
pub use join::{Join, JoinRequest};
pub use state::{TaskId, TaskInfo, TaskState};

pub(crate) use self::core::Body;
