//! Convenience constructors for wait delegates.

use std::sync::Arc;

use tether_worker::{DispatchQueue, WaitTimeout};

use crate::callable::{Callable, Function, Method};
use crate::invocation::WaitDelegate;

/// Binds a free function to run on `queue`, waiting at most `timeout` per call.
pub fn make_delegate<F, Args, R>(function: F, queue: Arc<dyn DispatchQueue>, timeout: impl Into<WaitTimeout>) -> WaitDelegate<Args, R>
where
	F: Function<Args, R>,
	Args: Send + 'static,
	R: Send + 'static,
{
	WaitDelegate::new(Callable::free(function), Some(queue), timeout.into())
}

/// Binds `method` on a shared `object` to run on `queue`.
pub fn make_bound_delegate<T, M, Args, R>(object: Arc<T>, method: M, queue: Arc<dyn DispatchQueue>, timeout: impl Into<WaitTimeout>) -> WaitDelegate<Args, R>
where
	T: Send + Sync + 'static,
	M: Method<T, Args, R>,
	Args: Send + 'static,
	R: Send + 'static,
{
	WaitDelegate::new(Callable::bound(object, method), Some(queue), timeout.into())
}

/// Binds a capturing closure to run on `queue`.
pub fn make_closure_delegate<F, Args, R>(closure: F, queue: Arc<dyn DispatchQueue>, timeout: impl Into<WaitTimeout>) -> WaitDelegate<Args, R>
where
	F: Function<Args, R>,
	Args: Send + 'static,
	R: Send + 'static,
{
	WaitDelegate::new(Callable::closure(closure), Some(queue), timeout.into())
}

/// Binds a free function with no target thread; calls run synchronously.
pub fn make_direct_delegate<F, Args, R>(function: F) -> WaitDelegate<Args, R>
where
	F: Function<Args, R>,
	Args: Send + 'static,
	R: Send + 'static,
{
	WaitDelegate::direct(Callable::free(function))
}
