//! Crossings between OS threads and the cooperative world.
//!
//! * [`External`] runs blocking code from inside a task. The call is
//!   handed to a [`BlockingPool`] and the task suspends on a
//!   [`BlockingRequest`] until the worker is done.
//! * [`Function`] lets a foreign thread run a task to completion and wait
//!   for its result.
//!
//! Tasks are never touched off the driving thread. Workers only ever
//! write a [`Handoff`] slot, and foreign callers only ever queue a
//! [`Job`](crate::Job).

mod external;
mod function;
mod handoff;
mod pool;

pub use external::External;
pub use function::Function;
pub use handoff::{BlockingRequest, Handoff, handoff};
pub use pool::{BlockingPool, ThreadPerCall};
