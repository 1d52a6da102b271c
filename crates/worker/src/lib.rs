//! Worker thread runtime primitives for cross-thread delegates.
//!
//! This crate provides the pieces a delegate needs from its host runtime:
//! * `Signal`: counting wait primitive with bounded or infinite waits
//! * `WaitTimeout`: wait bound, with `WAIT_INFINITE` as the millisecond sentinel
//! * `DispatchQueue` / `WorkItem`: the hand-off contract to a target thread
//! * `WorkerThread`: a named OS thread draining a FIFO dispatch queue

#![warn(missing_docs)]

pub mod error;
mod panic;
pub mod queue;
mod signal;
mod spawn;
mod thread;
mod timeout;

pub use error::{DispatchError, Result};
pub use panic::panic_message;
pub use queue::{DispatchQueue, WorkItem, work_item};
pub use signal::Signal;
pub use thread::{WorkerSpec, WorkerStats, WorkerThread};
pub use timeout::{WAIT_INFINITE, WaitTimeout};
