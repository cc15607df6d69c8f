use core::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::synca::{lock_recovering, wait_recovering, wait_timeout_recovering};

/// `TaskId` identifies one submission to an executor.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskError {
    /// the callable panicked; carries the panic message when it was a string.
    Panicked(String),

    /// the executor was already shut down when the callable was submitted.
    Rejected,
}

impl std::error::Error for TaskError {}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type TaskResult<T> = Result<T, TaskError>;

struct FutureCell<T> {
    outcome: Mutex<Option<TaskResult<T>>>,
    completed: Condvar,
}

/// `TaskFuture` is a write-once, read-many result cell. The worker running
/// the callable completes it exactly once; any number of clones may wait on
/// it and all observe the same result.
pub struct TaskFuture<T> {
    id: TaskId,
    cell: Arc<FutureCell<T>>,
}

impl<T> Clone for TaskFuture<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for TaskFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFuture")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T> TaskFuture<T> {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            cell: Arc::new(FutureCell {
                outcome: Mutex::new(None),
                completed: Condvar::new(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        lock_recovering(&self.cell.outcome).is_some()
    }

    /// complete stores the outcome and wakes every waiter. A second
    /// completion is ignored; the first result stands.
    pub(crate) fn complete(&self, outcome: TaskResult<T>) {
        let mut slot = lock_recovering(&self.cell.outcome);
        if slot.is_some() {
            tracing::warn!(task = %self.id, "ignoring second completion of task future");
            return;
        }
        *slot = Some(outcome);
        drop(slot);
        self.cell.completed.notify_all();
    }
}

impl<T: Clone> TaskFuture<T> {
    /// `get_result` blocks until the callable has completed and returns its
    /// result.
    pub fn get_result(&self) -> TaskResult<T> {
        let mut slot = lock_recovering(&self.cell.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = wait_recovering(&self.cell.completed, slot);
        }
    }

    /// `try_result` returns the result if the callable has completed.
    #[must_use]
    pub fn try_result(&self) -> Option<TaskResult<T>> {
        lock_recovering(&self.cell.outcome).clone()
    }

    /// `get_result_timeout` waits at most `timeout`; `None` means the
    /// callable has not completed yet.
    #[must_use]
    pub fn get_result_timeout(&self, timeout: Duration) -> Option<TaskResult<T>> {
        let deadline = Instant::now() + timeout;
        let mut slot = lock_recovering(&self.cell.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Some(outcome.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = wait_timeout_recovering(&self.cell.completed, slot, deadline - now);
        }
    }
}
