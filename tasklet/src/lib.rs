//! # Tasklet
//!
//! **Tasklet** is the cooperative task core of a simulation-driven test
//! framework: the piece that wraps a single suspendable computation so an
//! external scheduler can drive it step by step.
//!
//! Tasklet does not ship a scheduler. It defines the narrow [`Schedule`]
//! interface a scheduler implements, and everything on the task side of
//! it:
//!
//! - **Tasks** with strict one-shot completion, forced termination and
//!   joins ([`task`])
//! - **Factories** that turn a computation-producing function into a
//!   fresh task per call, for free functions and bound methods alike
//!   ([`factory`])
//! - **Tests**: tasks with timing, skip / expect-fail / expect-error
//!   metadata, stages, log capture, timeouts and abort ([`testing`])
//! - A **blocking bridge** in both directions between OS threads and the
//!   cooperative world ([`bridge`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tasklet::{Coroutine, Resume, Step, suspend};
//!
//! let double = Coroutine::new("double").build(|x: u64| async move {
//!     suspend::<()>(sched.timer(Duration::from_nanos(5))).await?;
//!     Ok(x * 2)
//! });
//!
//! let mut task = double.call(&sched, 21);
//! let mut step = task.advance(Resume::start());
//! while let Step::Suspended(request) = step {
//!     // Wait for whatever `request` asks for, then:
//!     step = task.advance(Resume::with(()));
//! }
//!
//! assert_eq!(task.retval().unwrap(), Some(42));
//! ```
//!
//! ## Protocol
//!
//! A scheduler owns tasks as `Box<dyn Runnable>` and calls
//! [`advance`](task::Runnable::advance) with a [`Resume`]. Each call
//! returns either [`Step::Suspended`] with an opaque [`Request`] naming
//! what the task waits for, or [`Step::Completed`]. Failures and panics
//! inside a task are captured into its [`Outcome`] and never escape
//! `advance`.
//!
//! ## Logging
//!
//! Tasklet emits [`tracing`] events under the `tasklet::task`,
//! `tasklet::test` and `tasklet::bridge` targets and never installs a
//! subscriber itself. Set `TASKLET_SCHEDULER_DEBUG` to get an event per
//! advance and kill.

mod config;
mod error;
mod outcome;
mod request;
mod runtime;
mod schedule;

pub mod bridge;
pub mod factory;
pub mod testing;

pub use runtime::context::in_task;
pub use runtime::suspend::{Suspend, suspend};
pub use runtime::task;

pub use config::{Config, SCHEDULER_DEBUG_ENV, config};
pub use error::TaskError;
pub use outcome::{Failure, Outcome};
pub use request::{Payload, Request, Resume};
pub use schedule::{Enqueue, Job, Sched, Schedule};

pub use factory::{Coroutine, Factory, Hook, Kind, Test, TestFactory};
pub use task::{Runnable, Step, Task, TaskHandle};
pub use testing::{TestHandle, TestTask};
