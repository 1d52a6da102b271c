//! Bounded-wait cross-thread delegates.
//!
//! A caller binds a callable to a target thread's dispatch queue and a wait
//! bound, then invokes it. The call runs on the target thread while the
//! caller blocks until the result arrives or the bound elapses:
//! * `Callable`: free function, shared-object method, or closure with 0..=5 arguments
//! * `WaitDelegate`: per-call dispatch, bounded wait, at-most-once execution
//! * `Envelope`: argument snapshot travelling to the target thread
//! * `make_delegate` and friends: thin binding helpers

#![warn(missing_docs)]

pub mod callable;
mod envelope;
pub mod factory;
mod invocation;

// Used by the integration tests only.
#[cfg(test)]
use tracing_subscriber as _;

pub use callable::{Callable, Function, Method};
pub use envelope::Envelope;
pub use factory::{make_bound_delegate, make_closure_delegate, make_delegate, make_direct_delegate};
pub use invocation::{InvokeError, WaitDelegate};
pub use tether_worker::{DispatchError, DispatchQueue, WAIT_INFINITE, WaitTimeout, WorkerSpec, WorkerThread};
