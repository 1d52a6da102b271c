use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::panic::panic_message;
use crate::queue::{DispatchQueue, WorkItem, work_item};
use crate::spawn::spawn_named_thread;
use crate::{DispatchError, Result};

/// Builder spec for one worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSpec {
	pub(crate) name: String,
	pub(crate) stack_size: Option<usize>,
}

impl WorkerSpec {
	/// Creates a spec for a thread with the given name.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Sets an explicit stack size in bytes.
	///
	/// # Panics
	///
	/// Panics if `bytes` is zero.
	#[must_use]
	pub fn stack_size(mut self, bytes: usize) -> Self {
		assert!(bytes > 0, "worker stack size must be > 0");
		self.stack_size = Some(bytes);
		self
	}

	/// Returns the thread name.
	pub fn name(&self) -> &str {
		&self.name
	}
}

impl Default for WorkerSpec {
	fn default() -> Self {
		Self {
			name: "tether-worker".to_string(),
			stack_size: None,
		}
	}
}

/// Counters snapshot for one worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
	/// Items accepted but not yet finished.
	pub pending: usize,
	/// Items that ran to completion.
	pub executed: u64,
	/// Items that panicked while executing.
	pub panicked: u64,
}

#[derive(Debug, Default)]
struct WorkerCounters {
	pending: AtomicUsize,
	executed: AtomicU64,
	panicked: AtomicU64,
}

type ItemSender = mpsc::UnboundedSender<Box<dyn WorkItem>>;

/// Named OS thread draining a FIFO queue of work items.
///
/// Dropping the handle closes the queue, lets the thread finish every item
/// already accepted, and joins it.
pub struct WorkerThread {
	name: String,
	thread_id: ThreadId,
	tx: Mutex<Option<ItemSender>>,
	join: Mutex<Option<JoinHandle<()>>>,
	counters: Arc<WorkerCounters>,
}

impl WorkerThread {
	/// Starts a worker thread described by `spec`.
	pub fn spawn(spec: WorkerSpec) -> Result<Self> {
		let (tx, rx) = mpsc::unbounded_channel::<Box<dyn WorkItem>>();
		let counters = Arc::new(WorkerCounters::default());
		let task_counters = Arc::clone(&counters);
		let task_name = spec.name.clone();
		let handle = spawn_named_thread(&spec.name, spec.stack_size, move || drain(task_name, rx, task_counters))?;

		tracing::debug!(worker = %spec.name, "worker.thread.spawned");
		Ok(Self {
			name: spec.name,
			thread_id: handle.thread().id(),
			tx: Mutex::new(Some(tx)),
			join: Mutex::new(Some(handle)),
			counters,
		})
	}

	/// Starts a worker thread with default settings and the given name.
	pub fn named(name: impl Into<String>) -> Result<Self> {
		Self::spawn(WorkerSpec::new(name))
	}

	/// Queues a closure for execution on this thread.
	pub fn post<F>(&self, f: F) -> Result<()>
	where
		F: FnOnce() + Send + 'static,
	{
		self.enqueue(work_item(f))
	}

	/// Returns the number of accepted items not yet finished.
	pub fn pending(&self) -> usize {
		self.counters.pending.load(Ordering::Acquire)
	}

	/// Returns whether the queue still accepts work.
	pub fn is_open(&self) -> bool {
		self.tx.lock().is_some()
	}

	/// Returns a counters snapshot.
	pub fn stats(&self) -> WorkerStats {
		WorkerStats {
			pending: self.counters.pending.load(Ordering::Acquire),
			executed: self.counters.executed.load(Ordering::Acquire),
			panicked: self.counters.panicked.load(Ordering::Acquire),
		}
	}

	/// Closes the queue and joins the thread after it drains accepted items.
	///
	/// Called from the worker thread itself, the queue is closed but the
	/// thread is left to finish on its own.
	pub fn exit(&self) {
		if self.tx.lock().take().is_some() {
			tracing::debug!(worker = %self.name, pending = self.pending(), "worker.thread.close");
		}
		if self.is_current() {
			return;
		}
		let handle = self.join.lock().take();
		if let Some(handle) = handle
			&& handle.join().is_err()
		{
			tracing::warn!(worker = %self.name, "worker.thread.join_failed");
		}
	}
}

impl DispatchQueue for WorkerThread {
	fn name(&self) -> &str {
		&self.name
	}

	fn enqueue(&self, item: Box<dyn WorkItem>) -> Result<()> {
		let guard = self.tx.lock();
		let Some(tx) = guard.as_ref() else {
			return Err(DispatchError::Closed);
		};
		self.counters.pending.fetch_add(1, Ordering::AcqRel);
		if tx.send(item).is_err() {
			self.counters.pending.fetch_sub(1, Ordering::AcqRel);
			return Err(DispatchError::Closed);
		}
		tracing::trace!(worker = %self.name, pending = self.counters.pending.load(Ordering::Relaxed), "worker.thread.enqueue");
		Ok(())
	}

	fn is_current(&self) -> bool {
		std::thread::current().id() == self.thread_id
	}
}

impl Drop for WorkerThread {
	fn drop(&mut self) {
		self.exit();
	}
}

impl std::fmt::Debug for WorkerThread {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerThread")
			.field("name", &self.name)
			.field("open", &self.is_open())
			.field("stats", &self.stats())
			.finish()
	}
}

fn drain(name: String, mut rx: mpsc::UnboundedReceiver<Box<dyn WorkItem>>, counters: Arc<WorkerCounters>) {
	tracing::debug!(worker = %name, "worker.thread.start");
	while let Some(item) = rx.blocking_recv() {
		let outcome = panic::catch_unwind(AssertUnwindSafe(move || item.execute()));
		match outcome {
			Ok(()) => {
				counters.executed.fetch_add(1, Ordering::AcqRel);
			}
			Err(payload) => {
				counters.panicked.fetch_add(1, Ordering::AcqRel);
				tracing::error!(worker = %name, panic = %panic_message(&*payload), "worker.thread.item_panicked");
			}
		}
		counters.pending.fetch_sub(1, Ordering::AcqRel);
	}
	tracing::debug!(worker = %name, "worker.thread.exit");
}
