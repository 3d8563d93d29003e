//! Core runtime components.
//!
//! This module contains the pieces that make a computation drivable from
//! the outside:
//! - the per-thread current-task slot used by suspension points,
//! - the [`suspend`] primitive through which a computation hands a
//!   request to its scheduler,
//! - the [`task`] types themselves.
//!
//! The scheduler's main loop is not part of this crate; it drives tasks
//! through [`task::Runnable`].

pub(crate) mod context;
pub(crate) mod suspend;

pub mod task;
