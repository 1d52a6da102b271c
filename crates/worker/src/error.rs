//! Error types for dispatch queues and worker threads.

use thiserror::Error;

/// Errors raised when handing work to a dispatch queue.
#[derive(Debug, Error)]
pub enum DispatchError {
	/// The queue has been closed and no longer accepts work.
	#[error("dispatch queue is closed")]
	Closed,

	/// The operating system refused to start a worker thread.
	#[error("failed to spawn worker thread '{name}': {source}")]
	Spawn {
		/// Requested thread name.
		name: String,
		/// Underlying spawn failure.
		#[source]
		source: std::io::Error,
	},
}

/// Convenience alias for dispatch results.
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
