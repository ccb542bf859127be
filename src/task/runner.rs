//! The shared task runner.
//!
//! A [`TaskRunner`] multiplexes many [`TaskQueue`]s over worker threads
//! created on demand. All scheduling decisions run under one lock; task
//! bodies run with the lock released. At most one worker — the coordinator —
//! sits in a timed wait for the next eligibility deadline; every other
//! worker is either executing a task or exiting. The
//! `execute_call_count`/`run_call_count` pair reconciles thread starts under
//! the lock, so N ready tasks never spawn more than one thread beyond the
//! workers already running.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, MutexGuard, OnceLock};

use tracing::{debug, trace, warn};

use crate::task::backend::{Backend, SystemBackend};
use crate::task::lockable::Lockable;
use crate::task::queue::{Task, TaskQueue};

/// The lock-guarded state of a runner: its own bookkeeping plus the state
/// of every queue it has created.
pub(crate) struct Scheduler {
    next_queue_id: u64,
    queues: HashMap<u64, QueueState>,
    /// Queues with a task currently executing.
    busy_queues: Vec<u64>,
    /// Queues with pending tasks and no active task, whether or not the
    /// head is eligible yet.
    ready_queues: Vec<u64>,
    execute_call_count: u64,
    run_call_count: u64,
    coordinator_waiting: bool,
    coordinator_wake_up_at: i64,
}

pub(crate) struct QueueState {
    name: Arc<str>,
    active_task: Option<ActiveTask>,
    cancel_active_task: bool,
    shutdown: bool,
    /// Pending tasks in ascending eligibility order, FIFO on ties.
    future_tasks: Vec<Task>,
}

struct ActiveTask {
    name: String,
    cancelable: bool,
}

impl QueueState {
    fn new(name: Arc<str>) -> Self {
        Self {
            name,
            active_task: None,
            cancel_active_task: false,
            shutdown: false,
            future_tasks: Vec::new(),
        }
    }
}

/// An opaque hold on a runner's lock, passed through
/// [`Backend::coordinator_wait`] so the wait can atomically release it.
pub struct SchedulerGuard<'a>(pub(crate) MutexGuard<'a, Scheduler>);

struct Inner {
    backend: Box<dyn Backend>,
    scheduler: Lockable<Scheduler>,
}

/// A scheduler multiplexing task queues over on-demand worker threads.
///
/// Cloning is cheap and clones share the same scheduler.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

static GLOBAL: OnceLock<TaskRunner> = OnceLock::new();

impl TaskRunner {
    /// Creates a runner on the given backend.
    pub fn new(backend: Box<dyn Backend>) -> TaskRunner {
        TaskRunner {
            inner: Arc::new(Inner {
                backend,
                scheduler: Lockable::new(Scheduler {
                    next_queue_id: 10_000,
                    queues: HashMap::new(),
                    busy_queues: Vec::new(),
                    ready_queues: Vec::new(),
                    execute_call_count: 0,
                    run_call_count: 0,
                    coordinator_waiting: false,
                    coordinator_wake_up_at: -1,
                }),
            }),
        }
    }

    /// The process-wide runner, created lazily on a [`SystemBackend`].
    pub fn global() -> &'static TaskRunner {
        GLOBAL.get_or_init(|| TaskRunner::new(Box::new(SystemBackend::new())))
    }

    /// Creates a fresh queue.
    pub fn new_queue(&self) -> TaskQueue {
        let (id, name) = {
            let mut s = self.lock();
            let id = s.next_queue_id;
            s.next_queue_id += 1;
            let name: Arc<str> = format!("Q{id}").into();
            s.queues.insert(id, QueueState::new(Arc::clone(&name)));
            (id, name)
        };
        let queue = TaskQueue { runner: self.clone(), id, name };
        self.inner.backend.decorate(&queue);
        queue
    }

    /// A snapshot of the queues currently busy or ready.
    pub fn active_queues(&self) -> Vec<TaskQueue> {
        let s = self.lock();
        s.busy_queues
            .iter()
            .chain(s.ready_queues.iter())
            .map(|&id| TaskQueue {
                runner: self.clone(),
                id,
                name: Arc::clone(&s.queues[&id].name),
            })
            .collect()
    }

    /// Issues cancellation to every tracked queue.
    pub fn cancel_all(&self) {
        let mut s = self.lock();
        let busy: Vec<u64> = s.busy_queues.clone();
        for id in busy {
            Self::cancel_queue_locked(&mut s, id);
        }
        let ready: Vec<u64> = s.ready_queues.clone();
        for id in ready {
            Self::cancel_queue_locked(&mut s, id);
        }
        let Scheduler { ready_queues, queues, .. } = &mut *s;
        ready_queues.retain(|id| queues.get(id).map_or(false, |q| !q.future_tasks.is_empty()));
    }

    /// Wakes a coordinator waiting in [`TaskRunner::wait_coordinator`].
    /// Intended for [`Backend`] implementations.
    pub fn notify_coordinator(&self) {
        self.inner.scheduler.notify();
    }

    /// Releases the lock and waits up to `nanos` or until notified.
    /// Intended for [`Backend`] implementations.
    pub fn wait_coordinator<'a>(
        &'a self,
        guard: SchedulerGuard<'a>,
        nanos: i64,
    ) -> (SchedulerGuard<'a>, bool) {
        let (guard, timed_out) = self.inner.scheduler.wait_nanos(guard.0, nanos);
        (SchedulerGuard(guard), timed_out)
    }

    fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.inner.scheduler.lock()
    }

    fn nano_time(&self) -> i64 {
        self.inner.backend.nano_time()
    }

    // ===== queue operations, called through TaskQueue handles =====

    pub(crate) fn schedule(&self, queue_id: u64, task: Task, delay_nanos: i64) {
        let mut s = self.lock();
        let now = self.nano_time();
        let queue = s.queues.get_mut(&queue_id).expect("queue state missing");

        if queue.shutdown {
            if task.is_cancelable() {
                debug!(queue = %queue.name, task = %task.name(), "schedule canceled: queue is shut down");
                return;
            }
            panic!("queue {} is shut down", queue.name);
        }

        if Self::schedule_and_decide(now, queue, task, delay_nanos, false) {
            self.kick_coordinator(&mut s, queue_id);
        }
    }

    pub(crate) fn cancel_queue(&self, queue_id: u64) {
        let mut s = self.lock();
        if Self::cancel_queue_locked(&mut s, queue_id) {
            self.kick_coordinator(&mut s, queue_id);
        }
    }

    pub(crate) fn shutdown_queue(&self, queue_id: u64) {
        let mut s = self.lock();
        s.queues.get_mut(&queue_id).expect("queue state missing").shutdown = true;
        if Self::cancel_queue_locked(&mut s, queue_id) {
            self.kick_coordinator(&mut s, queue_id);
        }
    }

    /// Inserts `task` in eligibility order, FIFO on ties. Returns true when
    /// the task landed at the head and the queue's wake-up plan changed.
    fn schedule_and_decide(
        now: i64,
        queue: &mut QueueState,
        mut task: Task,
        delay_nanos: i64,
        recurrence: bool,
    ) -> bool {
        task.next_execute_nano_time = now + delay_nanos;
        if recurrence {
            trace!(queue = %queue.name, task = %task.name(), delay_nanos, "run again after delay");
        } else {
            trace!(queue = %queue.name, task = %task.name(), delay_nanos, "scheduled after delay");
        }

        let insert_at = queue
            .future_tasks
            .iter()
            .position(|t| t.next_execute_nano_time - now > delay_nanos)
            .unwrap_or(queue.future_tasks.len());
        queue.future_tasks.insert(insert_at, task);
        insert_at == 0
    }

    /// Drops cancelable pending tasks and flags a cancelable active task.
    /// Returns true if anything was dropped.
    fn cancel_queue_locked(s: &mut Scheduler, queue_id: u64) -> bool {
        let Some(queue) = s.queues.get_mut(&queue_id) else {
            return false;
        };
        if queue.active_task.as_ref().map_or(false, |active| active.cancelable) {
            queue.cancel_active_task = true;
        }
        let queue_name = Arc::clone(&queue.name);
        let before = queue.future_tasks.len();
        queue.future_tasks.retain(|task| {
            if task.is_cancelable() {
                trace!(queue = %queue_name, task = %task.name(), "canceled");
                false
            } else {
                true
            }
        });
        before != queue.future_tasks.len()
    }

    /// Reconciles a queue's `ready_queues` membership after its pending set
    /// changed, then makes sure somebody will act on it: the waiting
    /// coordinator if there is one, a fresh worker otherwise.
    fn kick_coordinator(&self, s: &mut Scheduler, queue_id: u64) {
        let (idle, has_pending) = {
            let queue = &s.queues[&queue_id];
            (queue.active_task.is_none(), !queue.future_tasks.is_empty())
        };
        if idle {
            if has_pending {
                if !s.ready_queues.contains(&queue_id) {
                    s.ready_queues.push(queue_id);
                }
            } else {
                s.ready_queues.retain(|id| *id != queue_id);
            }
        }

        if s.coordinator_waiting {
            self.inner.backend.coordinator_notify(self);
        } else {
            self.start_another_thread(s);
        }
    }

    /// Starts a worker unless one is already started but not yet running.
    /// The counter pair keeps N ready tasks from starting N+k threads.
    fn start_another_thread(&self, s: &mut Scheduler) {
        if s.execute_call_count > s.run_call_count {
            return; // a thread is on its way
        }
        s.execute_call_count += 1;
        let runner = self.clone();
        self.inner.backend.execute(self, Box::new(move || runner.run_worker()));
    }

    // ===== the worker loop =====

    fn run_worker(&self) {
        let mut guard = SchedulerGuard(self.lock());
        guard.0.run_call_count += 1;

        loop {
            let (g, next) = self.await_task_to_run(guard);
            guard = g;
            let Some((queue_id, mut task)) = next else {
                return;
            };

            trace!(task = %task.name(), "run task");
            drop(guard);

            // the body runs without the lock; a panic must still restore the
            // scheduler bookkeeping before it continues up this thread
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run_once()));

            guard = SchedulerGuard(self.lock());
            match outcome {
                Ok(delay_nanos) => {
                    self.after_run(&mut guard.0, queue_id, task, delay_nanos, true);
                }
                Err(payload) => {
                    warn!(task = %task.name(), "task failed");
                    self.after_run(&mut guard.0, queue_id, task, -1, false);
                    drop(guard);
                    panic::resume_unwind(payload);
                }
            }
        }
    }

    /// The decision loop. Either claims an eligible task, or parks this
    /// worker as the coordinator until the next deadline, or returns nothing
    /// and lets the worker exit.
    fn await_task_to_run<'a>(
        &'a self,
        mut guard: SchedulerGuard<'a>,
    ) -> (SchedulerGuard<'a>, Option<(u64, Task)>) {
        loop {
            let s = &mut *guard.0;
            if s.ready_queues.is_empty() {
                return (guard, None); // nothing to do
            }

            let now = self.nano_time();
            let mut min_delay_nanos = i64::MAX;
            let mut ready_queue: Option<u64> = None;
            let mut multiple_ready_tasks = false;

            for &queue_id in &s.ready_queues {
                let candidate = &s.queues[&queue_id].future_tasks[0];
                let candidate_delay = (candidate.next_execute_nano_time - now).max(0);
                if candidate_delay > 0 {
                    min_delay_nanos = min_delay_nanos.min(candidate_delay);
                } else if ready_queue.is_some() {
                    multiple_ready_tasks = true;
                    break;
                } else {
                    ready_queue = Some(queue_id);
                }
            }

            // a task is eligible right now: claim it, and if other work
            // remains and nobody is watching the clock, add a worker for it
            if let Some(queue_id) = ready_queue {
                let task = Self::before_run(s, queue_id);
                if multiple_ready_tasks || (!s.coordinator_waiting && !s.ready_queues.is_empty()) {
                    self.start_another_thread(s);
                }
                return (guard, Some((queue_id, task)));
            }

            // everything is in the future and someone is already waiting:
            // wake them if we learned of an earlier deadline, then exit
            if s.coordinator_waiting {
                if min_delay_nanos < s.coordinator_wake_up_at - now {
                    self.inner.backend.coordinator_notify(self);
                }
                return (guard, None);
            }

            // become the coordinator
            s.coordinator_waiting = true;
            s.coordinator_wake_up_at = now + min_delay_nanos;
            guard = self.inner.backend.coordinator_wait(self, guard, min_delay_nanos);
            guard.0.coordinator_waiting = false;
        }
    }

    /// Moves the queue's head task out for execution and the queue from
    /// ready to busy.
    fn before_run(s: &mut Scheduler, queue_id: u64) -> Task {
        let queue = s.queues.get_mut(&queue_id).expect("queue state missing");
        let mut task = queue.future_tasks.remove(0);
        task.next_execute_nano_time = -1;
        queue.active_task = Some(ActiveTask {
            name: task.name().to_string(),
            cancelable: task.is_cancelable(),
        });
        s.ready_queues.retain(|id| *id != queue_id);
        s.busy_queues.push(queue_id);
        task
    }

    /// Restores the queue after its task ran: reschedules recurrent tasks
    /// unless canceled or shut down, and hands the queue back to the ready
    /// list when more work is pending. A crashed worker starts its own
    /// replacement, because it is about to die with the work unfinished.
    fn after_run(
        &self,
        s: &mut Scheduler,
        queue_id: u64,
        task: Task,
        delay_nanos: i64,
        completed_normally: bool,
    ) {
        let now = self.nano_time();
        let queue = s.queues.get_mut(&queue_id).expect("queue state missing");
        debug_assert_eq!(
            queue.active_task.as_ref().map(|active| active.name.as_str()),
            Some(task.name()),
        );

        let cancel_active_task = std::mem::replace(&mut queue.cancel_active_task, false);
        queue.active_task = None;

        if delay_nanos != -1 && !cancel_active_task && !queue.shutdown {
            Self::schedule_and_decide(now, queue, task, delay_nanos, true);
        }

        let has_pending = !queue.future_tasks.is_empty();
        s.busy_queues.retain(|id| *id != queue_id);
        if has_pending {
            if !s.ready_queues.contains(&queue_id) {
                s.ready_queues.push(queue_id);
            }
            if !completed_normally {
                self.start_another_thread(s);
            }
        }
    }
}

#[cfg(test)]
impl TaskRunner {
    pub(crate) fn execute_and_run_counts(&self) -> (u64, u64) {
        let s = self.lock();
        (s.execute_call_count, s.run_call_count)
    }

    pub(crate) fn is_idle(&self) -> bool {
        let s = self.lock();
        s.busy_queues.is_empty()
            && s.ready_queues.is_empty()
            && s.execute_call_count == s.run_call_count
    }

    pub(crate) fn pending_task_names(&self, queue_id: u64) -> Vec<String> {
        let s = self.lock();
        s.queues[&queue_id].future_tasks.iter().map(|t| t.name().to_string()).collect()
    }
}
