//! Consumed dispatch interface.
//!
//! A [`DispatchQueue`] hands boxed [`WorkItem`]s to the thread it represents.
//! Implementations must execute every accepted item exactly once on that
//! thread, and the hand-off must publish the item's contents to the target
//! thread (any channel or lock-based queue does). Ordering between items is
//! left to the implementation.

use crate::Result;

/// One unit of work executed on a target thread.
pub trait WorkItem: Send {
	/// Consumes and runs the item on the draining thread.
	fn execute(self: Box<Self>);
}

/// Queue that delivers work items to one target thread.
pub trait DispatchQueue: Send + Sync {
	/// Human readable queue name for logs.
	fn name(&self) -> &str;

	/// Hands `item` to the target thread.
	///
	/// On error the item is dropped without being executed.
	fn enqueue(&self, item: Box<dyn WorkItem>) -> Result<()>;

	/// Returns `true` when called from the thread that drains this queue.
	fn is_current(&self) -> bool {
		false
	}
}

struct ClosureItem<F>(F);

impl<F> WorkItem for ClosureItem<F>
where
	F: FnOnce() + Send,
{
	fn execute(self: Box<Self>) {
		(self.0)()
	}
}

/// Boxes a closure as a work item.
pub fn work_item<F>(f: F) -> Box<dyn WorkItem>
where
	F: FnOnce() + Send + 'static,
{
	Box::new(ClosureItem(f))
}
