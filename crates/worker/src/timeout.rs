use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Millisecond sentinel meaning "wait forever".
pub const WAIT_INFINITE: i64 = -1;

/// Bound on how long a caller blocks waiting for a target thread.
///
/// Serialized as integer milliseconds; any negative value reads back as
/// [`WaitTimeout::Infinite`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum WaitTimeout {
	/// Block until signaled.
	#[default]
	Infinite,
	/// Block for at most this long. A zero bound only observes an already raised signal.
	Bounded(Duration),
}

impl WaitTimeout {
	/// Builds a timeout from milliseconds, treating negative values as infinite.
	pub fn from_millis(millis: i64) -> Self {
		match u64::try_from(millis) {
			Ok(millis) => Self::Bounded(Duration::from_millis(millis)),
			Err(_) => Self::Infinite,
		}
	}

	/// Returns the bound in milliseconds, or [`WAIT_INFINITE`].
	pub fn as_millis(self) -> i64 {
		match self {
			Self::Infinite => WAIT_INFINITE,
			Self::Bounded(bound) => i64::try_from(bound.as_millis()).unwrap_or(i64::MAX),
		}
	}

	/// Returns `true` for an unbounded wait.
	pub const fn is_infinite(self) -> bool {
		matches!(self, Self::Infinite)
	}

	/// Absolute deadline measured from `now`. `None` when the wait is unbounded
	/// or the bound overflows the clock.
	pub(crate) fn deadline_from(self, now: Instant) -> Option<Instant> {
		match self {
			Self::Infinite => None,
			Self::Bounded(bound) => now.checked_add(bound),
		}
	}
}

impl From<Duration> for WaitTimeout {
	fn from(bound: Duration) -> Self {
		Self::Bounded(bound)
	}
}

impl From<i64> for WaitTimeout {
	fn from(millis: i64) -> Self {
		Self::from_millis(millis)
	}
}

impl From<WaitTimeout> for i64 {
	fn from(timeout: WaitTimeout) -> Self {
		timeout.as_millis()
	}
}
