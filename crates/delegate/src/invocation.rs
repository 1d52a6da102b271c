//! Bounded-wait cross-thread invocation.
//!
//! A [`WaitDelegate`] holds immutable configuration: the callable, the
//! target dispatch queue, and the wait bound. Every call builds a fresh
//! [`CallCell`] shared between the caller and the target thread through an
//! `Arc`; the strong count is exactly two at dispatch (the caller's handle and
//! the envelope's), each side drops its share once, and whichever side drops
//! last frees the cell.
//!
//! Ordering between the two sides:
//! * the caller marks the call abandoned only after its wait has returned;
//! * the target thread starts the callable only if, under the cell lock, the
//!   call is still `Dispatched`.
//!
//! So a callable that starts always starts while its caller is still waiting,
//! and a call whose caller gave up first never starts. Both decisions are
//! made under the same lock, which totally orders them.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tether_worker::{DispatchError, DispatchQueue, Signal, WaitTimeout, panic_message};
use thiserror::Error;

use crate::callable::Callable;
use crate::envelope::Envelope;

/// Failure of a single cross-thread call.
#[derive(Debug, Error)]
pub enum InvokeError {
	/// The caller stopped waiting before the target thread completed the call.
	#[error("timed out waiting for the target thread")]
	TimedOut,

	/// The dispatch queue refused the call.
	#[error(transparent)]
	Dispatch(#[from] DispatchError),

	/// The callable panicked on the target thread.
	#[error("target function panicked: {0}")]
	Panicked(String),
}

/// Per-call progress, guarded by the cell lock.
#[derive(Debug)]
enum CallPhase<R> {
	/// Queued; the caller is still waiting.
	Dispatched,
	/// The target thread is running the callable.
	Running,
	/// Finished; the result waits for the caller.
	Completed(R),
	/// The callable panicked.
	Panicked(String),
	/// The caller stopped waiting.
	Abandoned,
	/// The caller took the outcome.
	Settled,
}

/// Call-scoped state shared by the caller and the target thread.
pub(crate) struct CallCell<Args, R> {
	callable: Callable<Args, R>,
	signal: Signal,
	phase: Mutex<CallPhase<R>>,
}

impl<Args, R> CallCell<Args, R> {
	fn new(callable: Callable<Args, R>) -> Self {
		Self {
			callable,
			signal: Signal::new(),
			phase: Mutex::new(CallPhase::Dispatched),
		}
	}

	pub(crate) fn callable(&self) -> &Callable<Args, R> {
		&self.callable
	}

	/// Target side: runs the callable unless the caller already gave up.
	pub(crate) fn execute(&self, args: Args) {
		{
			let mut phase = self.phase.lock();
			if !matches!(*phase, CallPhase::Dispatched) {
				tracing::trace!(callable = ?self.callable, "delegate.skip_abandoned");
				return;
			}
			*phase = CallPhase::Running;
		}

		// Run outside the lock so an abandoning caller never blocks on the callable.
		let result = panic::catch_unwind(AssertUnwindSafe(|| self.callable.invoke(args)));

		let mut phase = self.phase.lock();
		if matches!(*phase, CallPhase::Abandoned) {
			tracing::debug!(callable = ?self.callable, "delegate.result_discarded");
			return;
		}
		*phase = match result {
			Ok(value) => CallPhase::Completed(value),
			Err(payload) => {
				let message = panic_message(&*payload);
				tracing::error!(callable = ?self.callable, panic = %message, "delegate.target_panicked");
				CallPhase::Panicked(message)
			}
		};
		self.signal.signal();
	}

	/// Caller side: waits up to `timeout`, then settles the outcome.
	fn wait(&self, timeout: WaitTimeout) -> Result<R, InvokeError> {
		let signaled = self.signal.wait(timeout);
		let mut phase = self.phase.lock();
		if !signaled {
			*phase = CallPhase::Abandoned;
			return Err(InvokeError::TimedOut);
		}
		match std::mem::replace(&mut *phase, CallPhase::Settled) {
			CallPhase::Completed(value) => Ok(value),
			CallPhase::Panicked(message) => Err(InvokeError::Panicked(message)),
			// The signal is raised only after a terminal phase is stored.
			CallPhase::Dispatched | CallPhase::Running | CallPhase::Abandoned | CallPhase::Settled => Err(InvokeError::TimedOut),
		}
	}
}

/// Delegate that runs its callable on a target thread and waits for the result.
///
/// The configuration is immutable and can be shared; each call gets its own
/// call-scoped state, so concurrent calls through one delegate never share
/// per-call data. Without a target queue the delegate calls synchronously.
pub struct WaitDelegate<Args, R> {
	callable: Callable<Args, R>,
	queue: Option<Arc<dyn DispatchQueue>>,
	timeout: WaitTimeout,
	last: Option<Result<R, InvokeError>>,
}

impl<Args, R> WaitDelegate<Args, R>
where
	Args: Send + 'static,
	R: Send + 'static,
{
	/// Creates a delegate targeting `queue`, or a synchronous one when `queue` is `None`.
	pub fn new(callable: Callable<Args, R>, queue: Option<Arc<dyn DispatchQueue>>, timeout: WaitTimeout) -> Self {
		Self {
			callable,
			queue,
			timeout,
			last: None,
		}
	}

	/// Creates a delegate that always calls on the current thread.
	pub fn direct(callable: Callable<Args, R>) -> Self {
		Self::new(callable, None, WaitTimeout::Infinite)
	}

	/// Calls the target and returns its result or the reason it is unavailable.
	///
	/// Does not touch [`is_success`](Self::is_success); safe to use from
	/// many threads through a shared reference.
	pub fn try_invoke(&self, args: Args) -> Result<R, InvokeError> {
		let Some(queue) = self.queue.as_deref() else {
			return Ok(self.callable.invoke(args));
		};
		if queue.is_current() {
			// Waiting on our own queue could only time out.
			tracing::trace!(queue = queue.name(), "delegate.invoke_inline");
			return Ok(self.callable.invoke(args));
		}

		let cell = Arc::new(CallCell::new(self.callable.clone()));
		let envelope = Envelope::new(Arc::clone(&cell), args);
		debug_assert_eq!(Arc::strong_count(&cell), 2);

		tracing::trace!(queue = queue.name(), timeout_ms = self.timeout.as_millis(), "delegate.dispatch");
		if let Err(err) = queue.enqueue(Box::new(envelope)) {
			tracing::warn!(queue = queue.name(), error = %err, "delegate.dispatch_failed");
			return Err(err.into());
		}

		let outcome = cell.wait(self.timeout);
		if outcome.is_err() {
			tracing::debug!(queue = queue.name(), timeout_ms = self.timeout.as_millis(), "delegate.timeout");
		}
		outcome
	}

	/// Calls the target and returns its result, or `None` when the call did not succeed.
	pub fn async_invoke(&self, args: Args) -> Option<R> {
		self.try_invoke(args).ok()
	}

	/// Calls the target, records the outcome, and returns a copy of the result.
	///
	/// Afterwards [`is_success`](Self::is_success) reports whether the call
	/// completed in time and [`return_value`](Self::return_value) exposes the
	/// result.
	pub fn invoke(&mut self, args: Args) -> Option<R>
	where
		R: Clone,
	{
		let outcome = self.try_invoke(args);
		let value = outcome.as_ref().ok().cloned();
		self.last = Some(outcome);
		value
	}
}

impl<Args, R> WaitDelegate<Args, R> {
	/// Returns `true` when the last [`invoke`](Self::invoke) completed before its timeout.
	pub fn is_success(&self) -> bool {
		matches!(self.last, Some(Ok(_)))
	}

	/// Returns the result of the last successful [`invoke`](Self::invoke).
	pub fn return_value(&self) -> Option<&R> {
		self.last.as_ref()?.as_ref().ok()
	}

	/// Returns why the last [`invoke`](Self::invoke) failed.
	pub fn last_error(&self) -> Option<&InvokeError> {
		self.last.as_ref()?.as_ref().err()
	}

	/// Returns the bound callable.
	pub fn callable(&self) -> &Callable<Args, R> {
		&self.callable
	}

	/// Returns the target queue, if any.
	pub fn queue(&self) -> Option<&Arc<dyn DispatchQueue>> {
		self.queue.as_ref()
	}

	/// Returns the wait bound.
	pub fn timeout(&self) -> WaitTimeout {
		self.timeout
	}
}

impl<Args, R> Clone for WaitDelegate<Args, R> {
	/// Copies the configuration; the clone starts with no recorded outcome.
	fn clone(&self) -> Self {
		Self {
			callable: self.callable.clone(),
			queue: self.queue.clone(),
			timeout: self.timeout,
			last: None,
		}
	}
}

impl<Args, R> PartialEq for WaitDelegate<Args, R> {
	fn eq(&self, other: &Self) -> bool {
		let same_queue = match (&self.queue, &other.queue) {
			(None, None) => true,
			(Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
			_ => false,
		};
		same_queue && self.callable == other.callable
	}
}

impl<Args, R> Eq for WaitDelegate<Args, R> {}

impl<Args, R> fmt::Debug for WaitDelegate<Args, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WaitDelegate")
			.field("callable", &self.callable)
			.field("queue", &self.queue.as_ref().map(|queue| queue.name().to_string()))
			.field("timeout", &self.timeout)
			.field("success", &self.is_success())
			.finish()
	}
}
