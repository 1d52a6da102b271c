use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tether_delegate::{Callable, InvokeError, WaitDelegate, make_bound_delegate, make_closure_delegate, make_delegate, make_direct_delegate};
use tether_worker::{DispatchError, DispatchQueue, WaitTimeout, WorkerThread};
// Library-only dependencies.
use {thiserror as _, tracing as _};

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn square(x: i32) -> i32 {
	x * x
}

fn add(a: i32, b: i32) -> i32 {
	a + b
}

fn answer() -> u64 {
	42
}

fn sum5(a: u8, b: u16, c: u32, d: u64, e: i64) -> i64 {
	a as i64 + b as i64 + c as i64 + d as i64 + e
}

fn worker(name: &str) -> (Arc<WorkerThread>, Arc<dyn DispatchQueue>) {
	let worker = Arc::new(WorkerThread::named(name).unwrap());
	let queue: Arc<dyn DispatchQueue> = worker.clone();
	(worker, queue)
}

#[test]
fn direct_call_without_target_thread() {
	init_tracing();
	let mut delegate = make_direct_delegate(square);
	assert_eq!(delegate.invoke((5,)), Some(25));
	assert!(delegate.is_success());
	assert_eq!(delegate.return_value(), Some(&25));
}

#[test]
fn call_completes_on_the_worker_thread() {
	init_tracing();
	let (worker, queue) = worker("add-target");
	let mut delegate = make_delegate(add, queue, WaitTimeout::from_millis(1000));

	assert_eq!(delegate.invoke((2, 3)), Some(5));
	assert!(delegate.is_success());
	assert_eq!(delegate.return_value(), Some(&5));

	worker.exit();
	assert_eq!(worker.stats().executed, 1);
}

#[test]
fn busy_target_times_out_and_never_runs_the_call() {
	init_tracing();
	let (worker, queue) = worker("busy-target");
	let calls = Arc::new(AtomicUsize::new(0));
	let counted = Arc::clone(&calls);
	let mut delegate = make_closure_delegate(
		move |a: i32, b: i32| {
			counted.fetch_add(1, Ordering::SeqCst);
			a + b
		},
		queue,
		WaitTimeout::from_millis(100),
	);

	worker.post(|| thread::sleep(Duration::from_millis(600))).unwrap();
	let start = Instant::now();
	assert_eq!(delegate.invoke((2, 3)), None);
	let elapsed = start.elapsed();

	assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
	assert!(elapsed < Duration::from_millis(500), "waited past the bound: {elapsed:?}");
	assert!(!delegate.is_success());
	assert!(matches!(delegate.last_error(), Some(InvokeError::TimedOut)));

	// Draining the queue reaches the abandoned call, which must be skipped.
	worker.exit();
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn closed_worker_refuses_dispatch() {
	init_tracing();
	let (worker, queue) = worker("closed-target");
	worker.exit();

	let mut delegate = make_delegate(add, queue, WaitTimeout::Infinite);
	assert_eq!(delegate.invoke((1, 2)), None);
	assert!(matches!(delegate.last_error(), Some(InvokeError::Dispatch(DispatchError::Closed))));
}

#[test]
fn self_dispatch_runs_inline() {
	init_tracing();
	let (worker, queue) = worker("self-target");
	let delegate = make_delegate(square, queue, WaitTimeout::Infinite);

	let (tx, rx) = mpsc::channel();
	worker.post(move || tx.send(delegate.try_invoke((7,)).ok()).unwrap()).unwrap();
	assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(Some(49)));
	worker.exit();
}

#[test]
fn panicking_target_reports_and_worker_survives() {
	init_tracing();
	let (worker, queue) = worker("panic-target");
	let failing: WaitDelegate<(), ()> = WaitDelegate::new(Callable::closure(|| panic!("target failure")), Some(Arc::clone(&queue)), WaitTimeout::from_millis(2000));

	match failing.try_invoke(()) {
		Err(InvokeError::Panicked(message)) => assert!(message.contains("target failure")),
		other => panic!("expected panic outcome, got {other:?}"),
	}

	let healthy = make_delegate(add, queue, WaitTimeout::from_millis(2000));
	assert_eq!(healthy.try_invoke((20, 22)).unwrap(), 42);
	worker.exit();
	assert_eq!(worker.stats().panicked, 0, "the envelope contains the panic itself");
}

struct Counter {
	base: i32,
	hits: AtomicUsize,
}

impl Counter {
	fn offset(&self, by: i32) -> i32 {
		self.hits.fetch_add(1, Ordering::SeqCst);
		self.base + by
	}
}

#[test]
fn bound_method_runs_against_the_shared_object() {
	init_tracing();
	let (worker, queue) = worker("method-target");
	let counter = Arc::new(Counter { base: 100, hits: AtomicUsize::new(0) });
	let delegate = make_bound_delegate(Arc::clone(&counter), Counter::offset, queue, WaitTimeout::from_millis(2000));

	assert_eq!(delegate.try_invoke((5,)).unwrap(), 105);
	assert_eq!(delegate.try_invoke((-1,)).unwrap(), 99);
	assert_eq!(counter.hits.load(Ordering::SeqCst), 2);

	let same = make_bound_delegate(Arc::clone(&counter), Counter::offset, delegate.queue().cloned().unwrap(), WaitTimeout::Infinite);
	assert_eq!(same, delegate);
	worker.exit();
}

#[test]
fn zero_and_five_argument_calls() {
	init_tracing();
	let (worker, queue) = worker("arity-target");
	let nullary = make_delegate(answer, Arc::clone(&queue), WaitTimeout::from_millis(2000));
	let quinary = make_delegate(sum5, queue, WaitTimeout::from_millis(2000));

	assert_eq!(nullary.async_invoke(()), Some(42));
	assert_eq!(quinary.async_invoke((1, 2, 3, 4, -10)), Some(0));
	worker.exit();
}

/// Counts drops of argument snapshots.
struct DropProbe(Arc<AtomicUsize>);

impl Drop for DropProbe {
	fn drop(&mut self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

struct Xorshift64(u64);

impl Xorshift64 {
	fn next(&mut self) -> u64 {
		let mut x = self.0;
		x ^= x << 13;
		x ^= x >> 7;
		x ^= x << 17;
		self.0 = x;
		x
	}

	fn next_below(&mut self, bound: u64) -> u64 {
		self.next() % bound
	}
}

#[test]
fn concurrent_calls_run_at_most_once_and_release_their_arguments() {
	init_tracing();
	const CALLERS: u64 = 6;
	const CALLS_PER_CALLER: u64 = 40;

	let (worker, queue) = worker("stress-target");
	let runs = Arc::new(Mutex::new(HashMap::<u64, usize>::new()));
	let drops = Arc::new(AtomicUsize::new(0));
	let recorded = Arc::clone(&runs);
	let callable: Callable<(DropProbe, u64, u64), u64> = Callable::closure(move |_probe: DropProbe, delay_us: u64, value: u64| {
		*recorded.lock().entry(value).or_default() += 1;
		thread::sleep(Duration::from_micros(delay_us));
		value * 3
	});

	let callers: Vec<_> = (0..CALLERS)
		.map(|caller| {
			let queue = Arc::clone(&queue);
			let callable = callable.clone();
			let drops = Arc::clone(&drops);
			thread::spawn(move || {
				let mut rng = Xorshift64(0x9E37_79B9_7F4A_7C15 ^ (caller + 1));
				let mut succeeded = Vec::new();
				for i in 0..CALLS_PER_CALLER {
					let timeout = WaitTimeout::from_millis(rng.next_below(4) as i64);
					let delegate = WaitDelegate::new(callable.clone(), Some(Arc::clone(&queue)), timeout);
					let value = caller * 1000 + i;
					let delay_us = rng.next_below(1500);
					match delegate.try_invoke((DropProbe(Arc::clone(&drops)), delay_us, value)) {
						Ok(result) => {
							assert_eq!(result, value * 3, "caller {caller} call {i}");
							succeeded.push(value);
						}
						Err(InvokeError::TimedOut) => {}
						Err(other) => panic!("caller {caller} call {i}: unexpected {other:?}"),
					}
				}
				succeeded
			})
		})
		.collect();

	let succeeded: Vec<u64> = callers.into_iter().flat_map(|handle| handle.join().unwrap()).collect();
	worker.exit();

	let total = (CALLERS * CALLS_PER_CALLER) as usize;
	let runs = runs.lock();
	assert!(runs.len() <= total);
	assert!(runs.values().all(|&count| count == 1), "a call ran more than once: {runs:?}");
	for value in &succeeded {
		assert_eq!(runs.get(value), Some(&1), "call {value} succeeded without running");
	}
	assert_eq!(drops.load(Ordering::SeqCst), total, "every argument snapshot is dropped exactly once");
	assert_eq!(worker.pending(), 0);
}

#[test]
fn shared_delegate_serves_many_callers() {
	init_tracing();
	let (worker, queue) = worker("shared-target");
	let delegate = Arc::new(make_delegate(add, queue, WaitTimeout::Infinite));

	let handles: Vec<_> = (0..4)
		.map(|n| {
			let delegate = Arc::clone(&delegate);
			thread::spawn(move || (0..25).map(|i| delegate.try_invoke((n, i)).unwrap()).sum::<i32>())
		})
		.collect();
	let total: i32 = handles.into_iter().map(|handle| handle.join().unwrap()).sum();

	// Sum over n in 0..4 of (25 * n + 0 + ... + 24).
	assert_eq!(total, 25 * 6 + 4 * 300);
	worker.exit();
	assert_eq!(worker.stats().executed, 100);
}
