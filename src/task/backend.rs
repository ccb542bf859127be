//! The platform seam of the task runner.
//!
//! Everything the scheduler needs from its host — a monotonic clock, the
//! coordinator wait/notify pair, and a way to start worker threads — goes
//! through [`Backend`]. Swapping the backend for a virtual-time fake makes
//! the scheduler's behavior deterministic under test; production uses
//! [`SystemBackend`].

use std::thread;
use std::time::Instant;

use crate::task::runner::SchedulerGuard;
use crate::task::{TaskQueue, TaskRunner};

/// The host services a [`TaskRunner`] is built on.
pub trait Backend: Send + Sync {
    /// A monotonic timestamp in nanoseconds. Only differences are
    /// meaningful; the origin is unspecified.
    fn nano_time(&self) -> i64;

    /// Wakes the runner's coordinator out of [`Backend::coordinator_wait`].
    fn coordinator_notify(&self, runner: &TaskRunner);

    /// Atomically releases the runner's lock and waits up to `nanos`
    /// nanoseconds, or until notified. Returns the reacquired guard.
    fn coordinator_wait<'a>(
        &self,
        runner: &'a TaskRunner,
        guard: SchedulerGuard<'a>,
        nanos: i64,
    ) -> SchedulerGuard<'a>;

    /// Submits a worker body for execution on some thread. Must not block
    /// the caller, which may be holding the runner's lock.
    fn execute(&self, runner: &TaskRunner, runnable: Box<dyn FnOnce() + Send>);

    /// A hook observing every queue the runner creates. The default does
    /// nothing; test backends use it to instrument queues.
    fn decorate(&self, _queue: &TaskQueue) {}
}

/// The production backend: wall clock and plain OS threads.
pub struct SystemBackend {
    origin: Instant,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SystemBackend {
    fn nano_time(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
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
        let (guard, _timed_out) = runner.wait_coordinator(guard, nanos);
        guard
    }

    fn execute(&self, _runner: &TaskRunner, runnable: Box<dyn FnOnce() + Send>) {
        thread::Builder::new()
            .name("task-runner-worker".to_string())
            .spawn(runnable)
            .expect("failed to spawn task runner worker");
    }
}
