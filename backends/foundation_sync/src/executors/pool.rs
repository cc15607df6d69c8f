use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::synca::{lock_recovering, wait_recovering, wait_timeout_recovering};

/// `WorkerId` is handed to each worker when it is spawned so it can tag its
/// own activity.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkerId(usize);

impl WorkerId {
    #[must_use]
    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug)]
struct PoolState {
    active: usize,
    shutdown: bool,
}

/// `ThreadPool` accounts for live worker threads within `[core_size,
/// max_size]`. It only decides whether a worker may start or stop; the
/// workers themselves decide when to ask.
pub struct ThreadPool {
    name: String,
    core_size: usize,
    max_size: usize,
    state: Mutex<PoolState>,
    drained: Condvar,
    next_worker: AtomicUsize,
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("core_size", &self.core_size)
            .field("max_size", &self.max_size)
            .field("active", &self.active_count())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl ThreadPool {
    #[must_use]
    pub fn new(core_size: usize, max_size: usize) -> Self {
        Self::named("pool", core_size, max_size)
    }

    #[must_use]
    pub fn named(name: impl Into<String>, core_size: usize, max_size: usize) -> Self {
        Self {
            name: name.into(),
            core_size,
            max_size,
            state: Mutex::new(PoolState {
                active: 0,
                shutdown: false,
            }),
            drained: Condvar::new(),
            next_worker: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn core_size(&self) -> usize {
        self.core_size
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        lock_recovering(&self.state).active
    }

    /// `try_create` starts a thread running `entry(id, arg)` when the pool
    /// has room: below `core_size`, or below `max_size` when
    /// `allow_exceed_core` is set. When no thread was started `arg` is
    /// handed back so the caller can queue it instead.
    pub fn try_create<A, F>(&self, entry: F, arg: A, allow_exceed_core: bool) -> Result<WorkerId, A>
    where
        A: Send + 'static,
        F: FnOnce(WorkerId, A) + Send + 'static,
    {
        if !self.try_reserve(allow_exceed_core) {
            return Err(arg);
        }

        let worker_id = WorkerId(self.next_worker.fetch_add(1, Ordering::Relaxed));

        // the argument travels through a shared slot so a failed spawn, which
        // drops the closure unrun, still lets us return it to the caller.
        let handoff = Arc::new(Mutex::new(Some(arg)));
        let thread_handoff = Arc::clone(&handoff);

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.name, worker_id.get()))
            .spawn(move || {
                let arg = lock_recovering(&thread_handoff).take();
                if let Some(arg) = arg {
                    entry(worker_id, arg);
                }
            });

        match spawned {
            Ok(_detached) => {
                tracing::debug!(pool = %self.name, worker = %worker_id, allow_exceed_core, "started pool worker");
                Ok(worker_id)
            }
            Err(err) => {
                tracing::warn!(pool = %self.name, error = %err, "failed to spawn pool worker");
                self.release();
                match lock_recovering(&handoff).take() {
                    Some(arg) => Err(arg),
                    None => unreachable!("a thread that failed to spawn cannot have taken its argument"),
                }
            }
        }
    }

    /// `try_reserve` counts one more live worker under the same rule as
    /// [`ThreadPool::try_create`] without spawning anything. Used by a
    /// worker that had already been allowed to retire and found work.
    pub(crate) fn try_reserve(&self, allow_exceed_core: bool) -> bool {
        let mut state = lock_recovering(&self.state);
        let limit = if allow_exceed_core {
            self.max_size
        } else {
            self.core_size.min(self.max_size)
        };
        if state.active >= limit {
            return false;
        }
        state.active += 1;
        true
    }

    /// `try_remove` is called by an idle worker asking to retire. Workers
    /// beyond `core_size` are always let go; core workers only once shutdown
    /// was requested. A granted request has already been counted out.
    pub fn try_remove(&self) -> bool {
        let mut state = lock_recovering(&self.state);
        if state.active == 0 || (!state.shutdown && state.active <= self.core_size) {
            return false;
        }
        state.active -= 1;
        let now_empty = state.active == 0;
        drop(state);

        if now_empty {
            self.drained.notify_all();
        }
        true
    }

    fn release(&self) {
        let mut state = lock_recovering(&self.state);
        state.active = state.active.saturating_sub(1);
        let now_empty = state.active == 0;
        drop(state);

        if now_empty {
            self.drained.notify_all();
        }
    }

    pub fn request_shutdown(&self) {
        let mut state = lock_recovering(&self.state);
        state.shutdown = true;
        tracing::debug!(pool = %self.name, active = state.active, "pool shutdown requested");
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        lock_recovering(&self.state).shutdown
    }

    /// `await_empty` blocks until every worker has retired.
    pub fn await_empty(&self) {
        let mut state = lock_recovering(&self.state);
        while state.active > 0 {
            state = wait_recovering(&self.drained, state);
        }
    }

    /// `await_empty_timeout` waits at most `timeout` for every worker to
    /// retire and reports whether they did.
    pub fn await_empty_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = lock_recovering(&self.state);
        loop {
            if state.active == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = wait_timeout_recovering(&self.drained, state, deadline - now);
        }
    }
}
