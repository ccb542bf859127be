//! A mutex paired with a condition variable.
//!
//! The task runner guards all of its state — its own fields and every field
//! of every queue it tracks — with one of these. The pairing matters: the
//! coordinator protocol needs "atomically release the lock and wait up to a
//! deadline", which is exactly what a condition variable bound to the mutex
//! provides.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) struct Lockable<T> {
    mutex: Mutex<T>,
    condition: Condvar,
}

impl<T> Lockable<T> {
    pub(crate) fn new(value: T) -> Self {
        Self { mutex: Mutex::new(value), condition: Condvar::new() }
    }

    /// Acquires the lock. Poisoning is ignored: task bodies run off-lock, so
    /// a panicking task cannot leave the scheduler state half-mutated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically releases the lock and waits up to `nanos` nanoseconds or
    /// until [`Lockable::notify`] wakes it. Returns the reacquired guard and
    /// whether the wait timed out.
    pub(crate) fn wait_nanos<'a>(
        &self,
        guard: MutexGuard<'a, T>,
        nanos: i64,
    ) -> (MutexGuard<'a, T>, bool) {
        if nanos <= 0 {
            return (guard, true);
        }
        let (guard, result) = self
            .condition
            .wait_timeout(guard, Duration::from_nanos(nanos as u64))
            .unwrap_or_else(PoisonError::into_inner);
        (guard, result.timed_out())
    }

    /// Wakes a waiter blocked in [`Lockable::wait_nanos`].
    pub(crate) fn notify(&self) {
        self.condition.notify_all();
    }
}
