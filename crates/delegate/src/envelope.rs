use std::sync::Arc;

use tether_worker::WorkItem;

use crate::invocation::CallCell;

/// One outstanding call in flight to a target thread.
///
/// Pairs the argument snapshot with the target side's share of the call
/// cell. Executing the envelope consumes both; dropping it unexecuted
/// (a refused or discarded dispatch) releases the same share.
pub struct Envelope<Args, R> {
	cell: Arc<CallCell<Args, R>>,
	args: Args,
}

impl<Args, R> Envelope<Args, R> {
	pub(crate) fn new(cell: Arc<CallCell<Args, R>>, args: Args) -> Self {
		Self { cell, args }
	}
}

impl<Args, R> WorkItem for Envelope<Args, R>
where
	Args: Send + 'static,
	R: Send + 'static,
{
	fn execute(self: Box<Self>) {
		let Self { cell, args } = *self;
		cell.execute(args);
	}
}

impl<Args, R> std::fmt::Debug for Envelope<Args, R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Envelope").field("callable", self.cell.callable()).finish_non_exhaustive()
	}
}
