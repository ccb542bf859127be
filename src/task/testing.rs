//! A virtual-time backend for deterministic scheduler tests.
//!
//! `FakeBackend` keeps its own clock. Coordinator waits park briefly on the
//! real condition variable — so a kick can genuinely interrupt them — and
//! fast-forward the virtual clock to the deadline when nothing does. Worker
//! execution can be paused and released, letting a test line up several
//! scheduling calls before any worker observes them.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::task::backend::Backend;
use crate::task::runner::{SchedulerGuard, TaskRunner};
use crate::task::TaskQueue;

/// The longest a virtual wait spends parked on the real condition variable.
/// Long enough for a test to kick the coordinator, short enough to keep
/// undisturbed timeouts fast.
const REAL_WAIT_NANOS: i64 = 250_000_000;

pub(crate) struct FakeBackend {
    nanos: AtomicI64,
    waits: Mutex<Vec<i64>>,
    paused: AtomicBool,
    pending: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    execute_calls: AtomicUsize,
    decorated: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self {
            nanos: AtomicI64::new(0),
            waits: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            execute_calls: AtomicUsize::new(0),
            decorated: Mutex::new(Vec::new()),
        }
    }

    /// The current virtual time.
    pub(crate) fn virtual_now(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }

    /// Every coordinator wait requested so far, in nanoseconds.
    pub(crate) fn waits(&self) -> Vec<i64> {
        self.waits.lock().unwrap().clone()
    }

    /// How many worker starts the runner has requested.
    pub(crate) fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// The names of queues passed through the decorate hook.
    pub(crate) fn decorated(&self) -> Vec<String> {
        self.decorated.lock().unwrap().clone()
    }

    /// Queue worker bodies instead of running them.
    pub(crate) fn pause_execution(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Run everything queued while paused, and stop queueing.
    pub(crate) fn release_execution(&self) {
        self.paused.store(false, Ordering::SeqCst);
        let pending: Vec<_> = std::mem::take(&mut *self.pending.lock().unwrap());
        for runnable in pending {
            thread::spawn(runnable);
        }
    }
}

impl Backend for Arc<FakeBackend> {
    fn nano_time(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn coordinator_notify(&self, runner: &TaskRunner) {
        runner.notify_coordinator();
    }

    fn coordinator_wait<'a>(
        &self,
        runner: &'a TaskRunner,
        guard: SchedulerGuard<'a>,
        nanos: i64,
    ) -> SchedulerGuard<'a> {
        self.waits.lock().unwrap().push(nanos);
        let (guard, timed_out) = runner.wait_coordinator(guard, nanos.min(REAL_WAIT_NANOS));
        if timed_out {
            // nobody kicked us: the deadline "arrived"
            self.nanos.fetch_add(nanos, Ordering::SeqCst);
        }
        guard
    }

    fn execute(&self, _runner: &TaskRunner, runnable: Box<dyn FnOnce() + Send>) {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if self.paused.load(Ordering::SeqCst) {
            self.pending.lock().unwrap().push(runnable);
        } else {
            thread::spawn(runnable);
        }
    }

    fn decorate(&self, queue: &TaskQueue) {
        self.decorated.lock().unwrap().push(queue.name().to_string());
    }
}
