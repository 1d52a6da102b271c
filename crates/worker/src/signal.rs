use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::WaitTimeout;

/// Counting wait signal with bounded or unbounded waits.
///
/// Raising the signal with nobody waiting stores a permit; the next
/// [`Signal::wait`] consumes it without blocking.
#[derive(Debug, Default)]
pub struct Signal {
	permits: Mutex<usize>,
	cond: Condvar,
}

impl Signal {
	/// Creates an unsignaled primitive.
	pub fn new() -> Self {
		Self::default()
	}

	/// Drops every pending permit.
	pub fn reset(&self) {
		*self.permits.lock() = 0;
	}

	/// Adds one permit and wakes at most one waiter.
	pub fn signal(&self) {
		{
			let mut permits = self.permits.lock();
			*permits = permits.saturating_add(1);
		}
		self.cond.notify_one();
	}

	/// Returns the number of unconsumed permits.
	pub fn pending(&self) -> usize {
		*self.permits.lock()
	}

	/// Blocks until a permit is available or `timeout` elapses.
	///
	/// Returns `true` when a permit was consumed, `false` on timeout.
	pub fn wait(&self, timeout: WaitTimeout) -> bool {
		let deadline = timeout.deadline_from(Instant::now());
		let mut permits = self.permits.lock();
		match deadline {
			None => {
				while *permits == 0 {
					self.cond.wait(&mut permits);
				}
			}
			Some(deadline) => {
				// Spurious wakeups loop back; a timed-out wait still rechecks the count once.
				while *permits == 0 {
					if self.cond.wait_until(&mut permits, deadline).timed_out() {
						break;
					}
				}
			}
		}

		if *permits == 0 {
			return false;
		}
		*permits -= 1;
		true
	}
}
