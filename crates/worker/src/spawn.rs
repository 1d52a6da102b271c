use std::thread::{Builder, JoinHandle};

use crate::{DispatchError, Result};

/// Spawns a dedicated named OS thread, optionally with an explicit stack size.
pub(crate) fn spawn_named_thread<F, R>(name: &str, stack_size: Option<usize>, f: F) -> Result<JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker = name, ?stack_size, "worker.spawn_named_thread");
	let mut builder = Builder::new().name(name.to_string());
	if let Some(size) = stack_size {
		builder = builder.stack_size(size);
	}
	builder.spawn(f).map_err(|source| DispatchError::Spawn {
		name: name.to_string(),
		source,
	})
}
