//! Task factories and their builders.
//!
//! A factory turns an ordinary function returning a computation into
//! something that yields a fresh [`Task`](crate::task::Task) per call.
//! Factories are built in two steps: configure a builder, then hand it the
//! producer.
//!
//! ```rust,ignore
//! let read = Coroutine::new("read")
//!     .module(module_path!())
//!     .build(|addr: u32| async move { Ok(addr * 2) });
//!
//! let task = read.call(&sched, 21);
//! ```
//!
//! Every factory carries a [`Kind`] so a registration manager can tell
//! plain coroutines, hooks and tests apart by pattern matching.

mod builder;
mod factory;

pub use builder::{Coroutine, Hook, Test};
pub use factory::{Factory, Kind, TestFactory};
pub(crate) use factory::bound_info;
