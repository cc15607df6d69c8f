use core::fmt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::activity::{NoActivity, SharedActivityLog};
use crate::clock;
use crate::config::{ConfigResult, ExecutorConfig, KeepAlive};
use crate::synca::{build_buffer_with_activity, SharedBuffer};

use super::{Callable, TaskError, TaskFuture, TaskId, TaskResult, ThreadPool, WorkerId};

/// how long `shutdown` waits for the pool to drain before re-issuing
/// wake-ups that were lost to a full queue or taken by a retiring worker.
const SHUTDOWN_RECHECK_INTERVAL: Duration = Duration::from_millis(20);

/// `QueuedTask` is a submitted callable bound to its future, waiting in the
/// executor queue for a worker. The queue holds `Option<QueuedTask>`, where
/// `None` is the wake-up sentinel used during shutdown.
pub struct QueuedTask {
    id: TaskId,
    run: Box<dyn FnOnce(&Shared) + Send + 'static>,
}

impl fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueuedTask({})", self.id)
    }
}

impl QueuedTask {
    fn new<T>(callable: Callable<T>, future: TaskFuture<T>) -> Self
    where
        T: Send + 'static,
    {
        Self {
            id: future.id(),
            run: Box::new(move |shared| run_callable(shared, callable, future)),
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    fn execute(self, shared: &Shared) {
        tracing::trace!(task = %self.id, "executing task");
        (self.run)(shared);
    }
}

fn run_callable<T: 'static>(shared: &Shared, mut callable: Callable<T>, future: TaskFuture<T>) {
    let Some(period) = callable.period() else {
        future.complete(invoke_guarded(&mut callable));
        return;
    };

    let mut release = clock::now();
    loop {
        let outcome = invoke_guarded(&mut callable);
        if outcome.is_err() {
            future.complete(outcome);
            return;
        }

        release += period;
        clock::sleep_until(release);

        if shared.pool.is_shutdown() {
            tracing::debug!(task = %future.id(), "periodic task stopping on shutdown");
            future.complete(outcome);
            return;
        }
    }
}

fn invoke_guarded<T: 'static>(callable: &mut Callable<T>) -> TaskResult<T> {
    panic::catch_unwind(AssertUnwindSafe(|| callable.invoke())).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(panic = %message, "task panicked");
        TaskError::Panicked(message)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("task panicked with a non-string payload")
    }
}

enum Dequeued {
    Task(QueuedTask),
    WakeUp,
    Idle,
}

struct Shared {
    pool: ThreadPool,
    queue: SharedBuffer<Option<QueuedTask>>,
    keep_alive: KeepAlive,
    pending_wakeups: AtomicUsize,
    next_task: AtomicU64,
}

impl Shared {
    fn spawn_worker(
        self: &Arc<Self>,
        first: Option<QueuedTask>,
        allow_exceed_core: bool,
    ) -> Result<WorkerId, Option<QueuedTask>> {
        let shared = Arc::clone(self);
        self.pool.try_create(
            move |worker, first| worker_loop(&shared, worker, first),
            first,
            allow_exceed_core,
        )
    }

    /// idle-wait for the next queued entry, bounded by the keep-alive.
    fn next_task(&self) -> Dequeued {
        let dequeued = match self.keep_alive {
            KeepAlive::Forever => Some(self.queue.get()),
            KeepAlive::Idle(idle) => self.queue.poll(clock::deadline_after(idle)),
        };
        match dequeued {
            Some(Some(task)) => Dequeued::Task(task),
            Some(None) => Dequeued::WakeUp,
            None => Dequeued::Idle,
        }
    }

    /// makes sure an entry just queued has someone to run it when no worker
    /// is alive (possible with a core size of zero).
    fn ensure_worker(self: &Arc<Self>) {
        if self.pool.active_count() == 0 && self.spawn_worker(None, true).is_ok() {
            tracing::debug!("started worker for queued task on an empty pool");
        }
    }

    /// finds a home for an entry that could not stay in the queue: its own
    /// worker beyond the core size or, with the pool at its maximum, the
    /// calling thread. Work is never dropped and the caller never waits on
    /// queue space a busy pool may not free.
    fn dispatch_forced(self: &Arc<Self>, entry: Option<QueuedTask>) {
        let Some(task) = entry else {
            self.wakeup_consumed();
            return;
        };

        if let Err(Some(task)) = self.spawn_worker(Some(task), true) {
            self.run_on_caller(task);
        }
    }

    fn run_on_caller(&self, task: QueuedTask) {
        tracing::debug!(task = %task.id(), "pool at maximum size, running task on the calling thread");
        task.execute(self);
    }

    /// queues one wake-up sentinel per live worker not already owed one.
    fn wake_idle_workers(&self) {
        loop {
            let owed = self.pending_wakeups.fetch_add(1, Ordering::SeqCst);
            if owed >= self.pool.active_count() || self.queue.add(None).is_err() {
                self.wakeup_consumed();
                return;
            }
        }
    }

    fn wakeup_consumed(&self) {
        let _ = self
            .pending_wakeups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |owed| owed.checked_sub(1));
    }
}

fn worker_loop(shared: &Arc<Shared>, worker: WorkerId, first: Option<QueuedTask>) {
    let span = tracing::debug_span!("pool_worker", worker = worker.get());
    let _entered = span.enter();
    tracing::debug!("worker started");

    let mut next = first;
    loop {
        if let Some(task) = next.take() {
            task.execute(shared);
        }

        match shared.next_task() {
            Dequeued::Task(task) => {
                next = Some(task);
                continue;
            }
            Dequeued::WakeUp => shared.wakeup_consumed(),
            Dequeued::Idle => {}
        }

        if !shared.pool.try_remove() {
            continue;
        }

        // work queued between our last look and the retirement must not be
        // stranded, so look once more before leaving.
        match shared.queue.remove() {
            None => break,
            Some(None) => {
                if shared.queue.add(None).is_err() {
                    shared.wakeup_consumed();
                }
                break;
            }
            Some(Some(task)) => {
                if shared.pool.try_reserve(true) {
                    next = Some(task);
                    continue;
                }
                if let Err(rejected) = shared.queue.add(Some(task)) {
                    if let Some(task) = rejected.into_inner() {
                        shared.run_on_caller(task);
                    }
                }
                break;
            }
        }
    }

    tracing::debug!("worker retired");
}

/// `Executor` runs [`Callable`]s on a [`ThreadPool`], queueing them in a
/// protected buffer while no worker is free.
///
/// Submission first tries to start a worker within the core size, then
/// queues. When the queue is full its oldest entry is displaced onto a new
/// worker beyond the core size, or run by the submitting thread once the
/// pool is at its maximum, so nothing is dropped.
pub struct Executor {
    config: ExecutorConfig,
    shared: Arc<Shared>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("pool", &self.shared.pool)
            .field("queued", &self.shared.queue.len())
            .finish()
    }
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> ConfigResult<Self> {
        Self::with_activity(config, Arc::new(NoActivity))
    }

    /// `with_activity` records every operation on the executor queue to
    /// `activity`; records made by workers happen inside their span.
    pub fn with_activity(
        config: ExecutorConfig,
        activity: SharedActivityLog<Option<QueuedTask>>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let shared = Shared {
            pool: ThreadPool::named("executor", config.core_size, config.max_size),
            queue: build_buffer_with_activity(&config.queue, activity),
            keep_alive: config.keep_alive,
            pending_wakeups: AtomicUsize::new(0),
            next_task: AtomicU64::new(0),
        };

        tracing::debug!(?config, "executor created");
        Ok(Self {
            config,
            shared: Arc::new(shared),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.shared.pool.active_count()
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.pool.is_shutdown()
    }

    /// submit hands `callable` to a worker or the queue and returns the
    /// future its result will be published to. Submitting after shutdown
    /// returns a future already completed with [`TaskError::Rejected`].
    pub fn submit<T>(&self, callable: Callable<T>) -> TaskFuture<T>
    where
        T: Send + 'static,
    {
        let shared = &self.shared;
        let future = TaskFuture::new(TaskId(shared.next_task.fetch_add(1, Ordering::Relaxed)));

        if shared.pool.is_shutdown() {
            tracing::warn!(task = %future.id(), "rejecting task submitted after shutdown");
            future.complete(Err(TaskError::Rejected));
            return future;
        }

        let entry = Some(QueuedTask::new(callable, future.clone()));

        let Err(entry) = shared.spawn_worker(entry, false) else {
            return future;
        };

        let entry = match shared.queue.add(entry) {
            Ok(()) => {
                shared.ensure_worker();
                return future;
            }
            Err(rejected) => rejected.into_inner(),
        };

        let displaced = match shared.queue.remove() {
            Some(oldest) => {
                if let Err(rejected) = shared.queue.add(entry) {
                    shared.dispatch_forced(rejected.into_inner());
                }
                oldest
            }
            None => entry,
        };
        shared.dispatch_forced(displaced);

        future
    }

    /// shutdown stops the executor: already queued and running callables
    /// finish (periodic ones after their current period), every idle worker
    /// is woken exactly once and the call returns when the pool is empty.
    pub fn shutdown(&self) {
        let started = clock::RelativeClock::start();
        self.shared.pool.request_shutdown();

        loop {
            self.shared.wake_idle_workers();
            if self.shared.pool.await_empty_timeout(SHUTDOWN_RECHECK_INTERVAL) {
                break;
            }
        }

        tracing::info!(elapsed_ms = started.elapsed_millis(), "executor shutdown complete");
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if !self.shared.pool.is_shutdown() {
            self.shutdown();
        }
    }
}
