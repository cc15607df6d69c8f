#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use foundation_sync::activity::{Action, ActivityLog, SharedActivityLog};
use foundation_sync::config::{BufferConfig, ExecutorConfig, KeepAlive, SyncStrategy};
use foundation_sync::executors::{Callable, Executor, QueuedTask, TaskError};
use ntest::timeout;
use serial_test::serial;
use tracing_test::traced_test;

fn config(core_size: usize, max_size: usize, strategy: SyncStrategy, capacity: usize) -> ExecutorConfig {
    ExecutorConfig::new(core_size, max_size, KeepAlive::millis(50))
        .with_queue(BufferConfig::new(strategy, capacity))
}

/// Tracks how many callables run at once and the highest value seen.
#[derive(Default)]
struct Concurrency {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Concurrency {
    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// WHY: the pool must never run more workers than its maximum, no matter
/// how many callables are submitted while every worker is busy.
/// WHAT: core 2 / max 4 with a 2-slot queue runs 16 slow callables; all
/// complete with their own result and at most 4 ever run together.
#[test]
#[serial]
#[timeout(20000)]
fn test_executor_stays_within_max_size() {
    for strategy in [SyncStrategy::CondVar, SyncStrategy::Semaphore] {
        let executor = Executor::new(config(2, 4, strategy, 2)).expect("valid config");
        let concurrency = Arc::new(Concurrency::default());

        let futures: Vec<_> = (0..16_usize)
            .map(|index| {
                let concurrency = Arc::clone(&concurrency);
                executor.submit(Callable::new(move || {
                    concurrency.enter();
                    thread::sleep(Duration::from_millis(15));
                    concurrency.leave();
                    index * 10
                }))
            })
            .collect();

        assert!(executor.active_workers() <= 4);
        for (index, future) in futures.iter().enumerate() {
            assert_eq!(future.get_result(), Ok(index * 10));
        }

        let peak = concurrency.peak.load(Ordering::SeqCst);
        assert!(peak <= 4, "{strategy:?} peaked at {peak} workers");
        assert!(peak >= 2, "{strategy:?} never ran in parallel");

        executor.shutdown();
        assert_eq!(executor.active_workers(), 0);
    }
}

/// WHY: idle workers beyond the core size must retire after the keep-alive
/// while core workers stay for the next burst.
/// WHAT: after a burst on core 1 / max 3 and twice the keep-alive of
/// idleness only the core worker remains.
#[test]
#[serial]
#[timeout(10000)]
fn test_extra_workers_retire_after_keep_alive() {
    let executor = Executor::new(config(1, 3, SyncStrategy::CondVar, 1)).expect("valid config");

    let futures: Vec<_> = (0..4)
        .map(|_| {
            executor.submit(Callable::new(|| {
                thread::sleep(Duration::from_millis(30));
            }))
        })
        .collect();
    assert!(executor.active_workers() > 1);

    for future in &futures {
        assert_eq!(future.get_result(), Ok(()));
    }
    thread::sleep(Duration::from_millis(250));

    assert_eq!(executor.active_workers(), 1);
    assert_eq!(executor.queued(), 0);
}

/// WHY: shutdown has to wake every idle worker, including ones waiting
/// forever on the queue, and must not return before they are all gone.
/// WHAT: with an infinite keep-alive and more workers than queue slots,
/// shutdown returns with no live worker.
#[test]
#[timeout(10000)]
fn test_shutdown_wakes_every_idle_worker() {
    let executor = Executor::new(
        ExecutorConfig::new(3, 4, KeepAlive::Forever)
            .with_queue(BufferConfig::new(SyncStrategy::Semaphore, 1)),
    )
    .expect("valid config");

    let futures: Vec<_> = (0..4_u8).map(|value| executor.submit(Callable::new(move || value))).collect();
    for (value, future) in (0..4_u8).zip(&futures) {
        assert_eq!(future.get_result(), Ok(value));
    }
    assert!(executor.active_workers() >= 3);

    executor.shutdown();

    assert_eq!(executor.active_workers(), 0);
    assert!(executor.is_shutdown());
}

/// WHY: callables already queued when shutdown starts still run; their
/// submitters are waiting on the futures.
/// WHAT: twenty queued callables on a single worker all complete across a
/// shutdown that starts while most of them are still queued.
#[test]
#[timeout(10000)]
fn test_shutdown_drains_queued_callables() {
    let executor = Executor::new(config(1, 1, SyncStrategy::CondVar, 32)).expect("valid config");
    let runs = Arc::new(AtomicUsize::new(0));

    let futures: Vec<_> = (0..20)
        .map(|_| {
            let runs = Arc::clone(&runs);
            executor.submit(Callable::new(move || {
                thread::sleep(Duration::from_millis(2));
                runs.fetch_add(1, Ordering::SeqCst)
            }))
        })
        .collect();

    executor.shutdown();

    assert_eq!(runs.load(Ordering::SeqCst), 20);
    assert!(futures.iter().all(|future| future.is_completed()));
}

/// WHY: a periodic callable runs until shutdown and then stops within one
/// period; its submitter receives the last result.
/// WHAT: a 10ms periodic counter stops running after shutdown and its
/// future holds the final count.
#[test]
#[serial]
#[timeout(10000)]
fn test_periodic_callable_stops_after_shutdown() {
    let executor = Executor::new(config(1, 2, SyncStrategy::CondVar, 4)).expect("valid config");
    let runs = Arc::new(AtomicUsize::new(0));

    let future = {
        let runs = Arc::clone(&runs);
        executor.submit(Callable::periodic(Duration::from_millis(10), move || {
            runs.fetch_add(1, Ordering::SeqCst) + 1
        }))
    };
    assert!(future.get_result_timeout(Duration::from_millis(45)).is_none());

    executor.shutdown();
    let stopped_at = runs.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(40));

    assert_eq!(runs.load(Ordering::SeqCst), stopped_at);
    assert_eq!(future.get_result(), Ok(stopped_at));
    assert!(stopped_at >= 3);
}

/// WHY: shutdown must not outlast a running periodic callable by more than
/// one of its periods.
/// WHAT: a 100ms periodic callable lets shutdown return in about one period
/// and reports the run count reached by then.
#[test]
#[serial]
#[timeout(10000)]
fn test_shutdown_returns_within_one_period_of_periodic_callable() {
    let executor = Executor::new(config(1, 1, SyncStrategy::CondVar, 2)).expect("valid config");
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    let future = executor.submit(Callable::periodic(Duration::from_millis(100), move || {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }));
    thread::sleep(Duration::from_millis(150));

    let started = Instant::now();
    executor.shutdown();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(130), "shutdown took {elapsed:?}");
    assert_eq!(executor.active_workers(), 0);
    assert_eq!(future.get_result(), Ok(runs.load(Ordering::SeqCst)));
}

/// WHY: a callable may submit more work to its own executor; with every
/// worker busy and the queue full the submission still has to return.
/// WHAT: on a single worker with a one-slot queue, a callable that submits
/// two more completes, and both nested callables complete too.
#[test]
#[serial]
#[timeout(5000)]
fn test_nested_submissions_on_saturated_pool_complete() {
    let executor = Arc::new(Executor::new(config(1, 1, SyncStrategy::CondVar, 1)).expect("valid config"));

    let inner_executor = Arc::clone(&executor);
    let outer = executor.submit(Callable::new(move || {
        let first = inner_executor.submit(Callable::new(|| 1_u8));
        let second = inner_executor.submit(Callable::new(|| 2_u8));
        (first, second)
    }));

    let (first, second) = match outer.get_result_timeout(Duration::from_secs(2)) {
        Some(Ok(nested)) => nested,
        other => panic!("outer callable did not complete: {:?}", other.map(|r| r.is_ok())),
    };
    assert_eq!(first.get_result(), Ok(1));
    assert_eq!(second.get_result(), Ok(2));

    executor.shutdown();
    assert_eq!(executor.active_workers(), 0);
}

/// WHY: a periodic callable keeps its release times on a fixed grid
/// instead of drifting by its own execution time.
/// WHAT: a 20ms periodic callable that works for 15ms each run still runs
/// about five times in 100ms.
#[test]
#[serial]
#[timeout(10000)]
fn test_periodic_release_times_do_not_drift() {
    let executor = Executor::new(config(1, 1, SyncStrategy::CondVar, 4)).expect("valid config");
    let runs = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&runs);
    let _future = executor.submit(Callable::periodic(Duration::from_millis(20), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(15));
    }));

    thread::sleep(Duration::from_millis(105));
    let observed = runs.load(Ordering::SeqCst);
    executor.shutdown();

    assert!((5..=6).contains(&observed), "ran {observed} times");
}

/// WHY: a pool with no core workers must still run what it queues.
/// WHAT: with core size 0 every submitted callable completes and the pool
/// empties again once the keep-alive expires.
#[test]
#[serial]
#[timeout(10000)]
fn test_zero_core_pool_runs_queued_work() {
    let executor = Executor::new(config(0, 2, SyncStrategy::Semaphore, 4)).expect("valid config");

    let futures: Vec<_> = (0..6_u32).map(|value| executor.submit(Callable::new(move || value * 2))).collect();
    for (value, future) in (0..6_u32).zip(&futures) {
        assert_eq!(future.get_result(), Ok(value * 2));
    }

    thread::sleep(Duration::from_millis(200));
    assert_eq!(executor.active_workers(), 0);

    let late = executor.submit(Callable::new(|| "late"));
    assert_eq!(late.get_result(), Ok("late"));
}

/// WHY: a panicking callable must not take its worker's slot with it; the
/// pool keeps serving other submissions.
/// WHAT: the panic message reaches the future as `Panicked` and the pool,
/// capped at one worker, still runs the next callable.
#[test]
#[timeout(10000)]
fn test_panicking_callable_keeps_pool_usable() {
    let executor = Executor::new(config(1, 1, SyncStrategy::CondVar, 4)).expect("valid config");

    let failed = executor.submit(Callable::new(|| -> u8 { panic!("division by zero") }));
    let after = executor.submit(Callable::new(|| 9_u8));

    assert_eq!(
        failed.get_result(),
        Err(TaskError::Panicked(String::from("division by zero")))
    );
    assert_eq!(after.get_result(), Ok(9));
    assert_eq!(executor.active_workers(), 1);
}

/// WHY: submissions after shutdown cannot run and must say so rather than
/// park the submitter forever.
/// WHAT: the returned future is already completed with `Rejected` and the
/// rejection is logged.
#[test]
#[traced_test]
fn test_submit_after_shutdown_is_rejected() {
    let executor = Executor::new(config(1, 2, SyncStrategy::CondVar, 4)).expect("valid config");
    executor.shutdown();

    let future = executor.submit(Callable::new(|| 1_u8));

    assert!(future.is_completed());
    assert_eq!(future.get_result(), Err(TaskError::Rejected));
    assert!(logs_contain("rejecting task submitted after shutdown"));
}

/// WHY: a future may be awaited from many threads at once; all of them
/// observe the same single result.
/// WHAT: four threads wait on clones of one future and receive its value.
#[test]
#[timeout(5000)]
fn test_future_shared_between_threads() {
    let executor = Executor::new(config(1, 1, SyncStrategy::CondVar, 4)).expect("valid config");
    let future = executor.submit(Callable::with_params(
        (6_u32, 7_u32),
        |(left, right)| left * right,
        None,
    ));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let future = future.clone();
            thread::spawn(move || future.get_result())
        })
        .collect();

    for waiter in waiters {
        assert_eq!(waiter.join().expect("waiter should join"), Ok(42));
    }
}

/// Remembers which threads took entries out of the executor queue.
#[derive(Default)]
struct TakerNames {
    names: Mutex<Vec<String>>,
}

impl ActivityLog<Option<QueuedTask>> for TakerNames {
    fn record(&self, action: Action, item: Option<&Option<QueuedTask>>) {
        let took_task = matches!(item, Some(Some(_)));
        if took_task && matches!(action, Action::Get | Action::Poll | Action::Remove) {
            let name = thread::current().name().unwrap_or("unnamed").to_string();
            match self.names.lock() {
                Ok(mut names) => names.push(name),
                Err(e) => e.into_inner().push(name),
            }
        }
    }
}

/// WHY: queue activity recorded by a worker is attributed to that worker.
/// WHAT: every queued task is taken by a thread named after the executor
/// pool.
#[test]
#[timeout(10000)]
fn test_queue_activity_is_attributed_to_workers() {
    let takers = Arc::new(TakerNames::default());
    let activity: SharedActivityLog<Option<QueuedTask>> = takers.clone();
    let executor = Executor::with_activity(config(1, 1, SyncStrategy::CondVar, 8), activity)
        .expect("valid config");

    let futures: Vec<_> = (0..5_u8).map(|value| executor.submit(Callable::new(move || value))).collect();
    for future in &futures {
        assert!(future.get_result().is_ok());
    }
    executor.shutdown();

    let names = match takers.names.lock() {
        Ok(names) => names.clone(),
        Err(e) => e.into_inner().clone(),
    };
    assert_eq!(names.len(), 4);
    assert!(names.iter().all(|name| name.starts_with("executor-")), "{names:?}");
}
