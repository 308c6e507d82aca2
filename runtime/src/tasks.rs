//! Per-device queue of deferred script work.
//!
//! Timers and asynchronous requests are queued here and only advance when
//! something pumps the queue: `Event::poll()` and `System::process_tasks()`
//! from the script, or `Device::process_tasks()` from the host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rhai::{Dynamic, EvalAltResult, FnPtr};

pub type TaskId = u64;

/// Work run on the pumping thread right before the callback; its result is
/// passed to the callback as the only argument.
pub type TaskWork = Box<dyn FnOnce() -> Dynamic + Send>;

pub struct Task {
    pub id: TaskId,
    due: Instant,
    callback: FnPtr,
    work: Option<TaskWork>,
}

impl Task {
    pub fn callback(&self) -> &FnPtr {
        &self.callback
    }

    /// Run the work (if any) and produce the callback arguments.
    pub fn into_call(self) -> (FnPtr, Vec<Dynamic>) {
        let args = match self.work {
            Some(work) => vec![work()],
            None => Vec::new(),
        };
        (self.callback, args)
    }
}

#[derive(Default)]
struct QueueState {
    next_id: TaskId,
    tasks: Vec<Task>,
}

/// Shared handle to a device's task queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    state: Arc<Mutex<QueueState>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `callback` to run once `delay` has passed.
    pub fn schedule(&self, callback: FnPtr, delay: Duration, work: Option<TaskWork>) -> TaskId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.tasks.push(Task {
            id,
            due: Instant::now() + delay,
            callback,
            work,
        });
        id
    }

    /// Remove a pending task. Returns `false` if it already ran or never
    /// existed.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        state.tasks.len() != before
    }

    pub fn clear(&self) {
        self.state.lock().tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every task due at `now`, oldest deadline first.
    pub fn take_ready(&self, now: Instant) -> Vec<Task> {
        let mut state = self.state.lock();
        let (mut ready, pending): (Vec<Task>, Vec<Task>) =
            state.tasks.drain(..).partition(|t| t.due <= now);
        state.tasks = pending;
        ready.sort_by_key(|t| (t.due, t.id));
        ready
    }

    /// Run every ready task through `invoke`.
    ///
    /// The queue lock is not held while callbacks run, so callbacks may
    /// schedule more tasks; those run on a later pump. Stops at the first
    /// callback error and returns it; the remaining ready tasks are dropped.
    pub fn pump<F>(&self, mut invoke: F) -> Result<usize, Box<EvalAltResult>>
    where
        F: FnMut(FnPtr, Vec<Dynamic>) -> Result<(), Box<EvalAltResult>>,
    {
        let ready = self.take_ready(Instant::now());
        let mut count = 0;
        for task in ready {
            let (callback, args) = task.into_call();
            invoke(callback, args)?;
            count += 1;
        }
        Ok(count)
    }
}
