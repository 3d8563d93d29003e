//! Tests: tasks with reporting metadata.
//!
//! A [`TestTask`] is a [`Task`](crate::task::Task) plus the bookkeeping a
//! regression manager needs: start times, skip / expect-fail /
//! expect-error flags, a stage, a deterministic [`SortKey`], captured log
//! lines, an optional timeout race, and [`abort`](TestHandle::abort).

mod capture;
mod meta;
mod test_task;

pub use capture::{Captures, LogCapture};
pub use meta::{ErrorKind, ExpectError, SortKey, StageGroup, TestMeta};
pub use test_task::{TestHandle, TestTask};
