//! Bound callable targets.
//!
//! A [`Callable`] captures *what* to call: a free function, a method bound
//! to a shared object, or a capturing closure. Arguments travel as one tuple
//! so every arity from zero to five shares the same generic path.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Function invocable with an argument tuple.
pub trait Function<Args, R>: Send + Sync + 'static {
	/// Calls the function with unpacked `args`.
	fn call(&self, args: Args) -> R;

	/// Code address of the target when it is a plain `fn` pointer.
	fn fn_address(&self) -> Option<usize> {
		None
	}
}

/// Method invocable on a receiver with an argument tuple.
pub trait Method<T, Args, R>: Send + Sync + 'static {
	/// Calls the method on `object` with unpacked `args`.
	fn call(&self, object: &T, args: Args) -> R;
}

macro_rules! impl_arity {
	($($arg:ident),*) => {
		impl<F, R, $($arg,)*> Function<($($arg,)*), R> for F
		where
			F: Fn($($arg),*) -> R + Send + Sync + 'static,
			R: 'static,
			$($arg: 'static,)*
		{
			#[allow(non_snake_case)]
			fn call(&self, ($($arg,)*): ($($arg,)*)) -> R {
				self($($arg),*)
			}

			fn fn_address(&self) -> Option<usize> {
				(self as &dyn Any).downcast_ref::<fn($($arg),*) -> R>().map(|function| *function as usize)
			}
		}

		impl<F, T, R, $($arg,)*> Method<T, ($($arg,)*), R> for F
		where
			F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
		{
			#[allow(non_snake_case)]
			fn call(&self, object: &T, ($($arg,)*): ($($arg,)*)) -> R {
				self(object, $($arg),*)
			}
		}
	};
}

impl_arity!();
impl_arity!(A1);
impl_arity!(A1, A2);
impl_arity!(A1, A2, A3);
impl_arity!(A1, A2, A3, A4);
impl_arity!(A1, A2, A3, A4, A5);

static NEXT_CLOSURE_ID: AtomicU64 = AtomicU64::new(1);

fn next_closure_id() -> u64 {
	NEXT_CLOSURE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Structural identity used for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
	Free(TypeId),
	Pointer(usize),
	Bound { method: TypeId, object: usize },
	Closure(u64),
}

type Target<Args, R> = dyn Fn(Args) -> R + Send + Sync;

/// Invocable reference to a free function, a bound method, or a closure.
///
/// Cloning is cheap and yields an equal callable.
pub struct Callable<Args, R> {
	target: Arc<Target<Args, R>>,
	identity: Identity,
}

impl<Args, R> Callable<Args, R>
where
	Args: 'static,
	R: 'static,
{
	/// Binds a free function.
	///
	/// Function items and capture-less closures compare equal when they have
	/// the same type, `fn` pointers when they have the same address. Anything
	/// else carries state and only equals its own clones, as with
	/// [`Callable::closure`]. A function item and a pointer to the same
	/// function are not equal.
	pub fn free<F>(function: F) -> Self
	where
		F: Function<Args, R>,
	{
		let identity = if size_of::<F>() == 0 {
			Identity::Free(TypeId::of::<F>())
		} else if let Some(address) = function.fn_address() {
			Identity::Pointer(address)
		} else {
			Identity::Closure(next_closure_id())
		};
		Self {
			target: Arc::new(move |args| function.call(args)),
			identity,
		}
	}

	/// Binds `method` to a shared `object`.
	///
	/// The callable keeps the object alive, so it is still valid when the
	/// call runs later on another thread.
	pub fn bound<T, M>(object: Arc<T>, method: M) -> Self
	where
		T: Send + Sync + 'static,
		M: Method<T, Args, R>,
	{
		let identity = Identity::Bound {
			method: TypeId::of::<M>(),
			object: Arc::as_ptr(&object).cast::<()>() as usize,
		};
		Self {
			target: Arc::new(move |args| method.call(&object, args)),
			identity,
		}
	}

	/// Wraps a closure that may capture state.
	///
	/// A closure callable only equals its own clones.
	pub fn closure<F>(closure: F) -> Self
	where
		F: Function<Args, R>,
	{
		Self {
			target: Arc::new(move |args| closure.call(args)),
			identity: Identity::Closure(next_closure_id()),
		}
	}
}

impl<Args, R> Callable<Args, R> {
	/// Calls the target on the current thread.
	pub fn invoke(&self, args: Args) -> R {
		(self.target)(args)
	}

	/// Number of live handles sharing the bound target.
	#[cfg(test)]
	pub(crate) fn holders(&self) -> usize {
		Arc::strong_count(&self.target)
	}
}

impl<Args, R> Clone for Callable<Args, R> {
	fn clone(&self) -> Self {
		Self {
			target: Arc::clone(&self.target),
			identity: self.identity,
		}
	}
}

impl<Args, R> PartialEq for Callable<Args, R> {
	fn eq(&self, other: &Self) -> bool {
		self.identity == other.identity
	}
}

impl<Args, R> Eq for Callable<Args, R> {}

impl<Args, R> Hash for Callable<Args, R> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.identity.hash(state);
	}
}

impl<Args, R> fmt::Debug for Callable<Args, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callable").field("identity", &self.identity).finish()
	}
}
