//! Tasks and task queues.
//!
//! A [`Task`] is a unit of work with a name, a cancelable flag and a body
//! that reports, through its return value, when it wants to run again. A
//! [`TaskQueue`] is an ordered set of pending tasks that execute strictly
//! sequentially: no two tasks of one queue are ever active at once.
//!
//! Queue handles are cheap clones; all of a queue's mutable state lives
//! inside its runner's single lock. A task belongs to at most one queue and
//! is physically moved between the queue and the worker that executes it,
//! so it can never appear in two places at once.

use std::fmt;

use crate::task::runner::TaskRunner;

/// A unit of work scheduled onto a [`TaskQueue`].
pub struct Task {
    name: String,
    cancelable: bool,
    /// The monotonic time this task becomes eligible, or -1 when the task
    /// is not currently scheduled.
    pub(crate) next_execute_nano_time: i64,
    run: Box<dyn FnMut() -> i64 + Send>,
}

impl Task {
    /// Creates a task. The body returns a non-negative delay in nanoseconds
    /// to request re-scheduling after that delay, or -1 to run just once.
    pub fn new(
        name: impl Into<String>,
        cancelable: bool,
        run: impl FnMut() -> i64 + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            cancelable,
            next_execute_nano_time: -1,
            run: Box::new(run),
        }
    }

    /// Creates a task that runs `f` once and is never rescheduled.
    pub fn once(name: impl Into<String>, cancelable: bool, f: impl FnOnce() + Send + 'static) -> Self {
        let mut f = Some(f);
        Self::new(name, cancelable, move || {
            if let Some(f) = f.take() {
                f();
            }
            -1
        })
    }

    /// The human-readable name of this task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`TaskQueue::cancel_all`] may drop this task.
    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    pub(crate) fn run_once(&mut self) -> i64 {
        (self.run)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("cancelable", &self.cancelable)
            .field("next_execute_nano_time", &self.next_execute_nano_time)
            .finish()
    }
}

/// A handle to one logical stream of work inside a [`TaskRunner`].
#[derive(Clone)]
pub struct TaskQueue {
    pub(crate) runner: TaskRunner,
    pub(crate) id: u64,
    pub(crate) name: std::sync::Arc<str>,
}

impl TaskQueue {
    /// The stable name of this queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schedules `task` to become eligible after `delay_nanos`.
    ///
    /// Tasks are kept in ascending eligibility order; equal eligibility
    /// times run in scheduling order.
    ///
    /// # Panics
    ///
    /// Panics when the queue is shut down and the task is not cancelable.
    /// Cancelable tasks scheduled after shutdown are dropped silently.
    pub fn schedule(&self, task: Task, delay_nanos: i64) {
        self.runner.schedule(self.id, task, delay_nanos);
    }

    /// Schedules a one-shot closure. Convenience over [`TaskQueue::schedule`].
    pub fn execute(
        &self,
        name: impl Into<String>,
        delay_nanos: i64,
        cancelable: bool,
        f: impl FnOnce() + Send + 'static,
    ) {
        self.schedule(Task::once(name, cancelable, f), delay_nanos);
    }

    /// Drops every cancelable pending task, and requests that a cancelable
    /// active task not be rescheduled when it finishes.
    pub fn cancel_all(&self) {
        self.runner.cancel_queue(self.id);
    }

    /// Shuts the queue down: cancelable pending tasks are dropped and no new
    /// tasks are accepted.
    pub fn shutdown(&self) {
        self.runner.shutdown_queue(self.id);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_tasks_never_ask_to_recur() {
        let mut task = Task::once("one-shot", true, || {});
        assert_eq!(task.run_once(), -1);
        // running again is harmless: the closure is already consumed
        assert_eq!(task.run_once(), -1);
    }

    #[test]
    fn recurrent_tasks_report_their_delay() {
        let mut remaining = 2;
        let mut task = Task::new("recurrent", false, move || {
            remaining -= 1;
            if remaining > 0 {
                1_000
            } else {
                -1
            }
        });
        assert_eq!(task.run_once(), 1_000);
        assert_eq!(task.run_once(), -1);
        assert!(!task.is_cancelable());
        assert_eq!(task.name(), "recurrent");
    }
}
