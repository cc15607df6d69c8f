#![cfg(test)]

use std::path::PathBuf;

use foundation_sync::config::{self, ConfigError, ExecutorConfig, KeepAlive, SyncStrategy, TimedWait};
use foundation_sync::executors::{Callable, Executor};
use foundation_testing::scenarios::{Semantics, WorkloadConfig};

fn write_config(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("foundation_sync_{}_{name}.toml", std::process::id()));
    std::fs::write(&path, content).expect("should write config file");
    path
}

/// WHY: deployments describe the executor in a TOML file; loading it must
/// yield a config the executor accepts as is.
/// WHAT: a file with every knob set loads and drives a working executor.
#[test]
fn test_executor_config_from_file() {
    let path = write_config(
        "executor",
        r#"
        core_size = 1
        max_size = 2
        keep_alive = 100

        [queue]
        strategy = "semaphore"
        capacity = 3
        timed_wait = { mode = "polling", interval_ms = 1 }
        "#,
    );

    let loaded: ExecutorConfig = config::from_path(&path).expect("should load");
    std::fs::remove_file(&path).expect("should clean up");

    assert_eq!(loaded.keep_alive, KeepAlive::millis(100));
    assert_eq!(loaded.queue.strategy, SyncStrategy::Semaphore);
    assert_eq!(loaded.queue.timed_wait, TimedWait::Polling { interval_ms: 1 });

    let executor = Executor::new(loaded).expect("valid config");
    assert_eq!(executor.submit(Callable::new(|| 5_u8)).get_result(), Ok(5));
    executor.shutdown();
}

/// WHY: the workload scenario shares the configuration format of the
/// buffers it drives.
/// WHAT: a workload file with a nested buffer table loads both levels.
#[test]
fn test_workload_config_from_file() {
    let path = write_config(
        "workload",
        r#"
        values = 8
        producers = 2
        consumers = 4

        [semantics]
        mode = "non_blocking"

        [buffer]
        strategy = "cond_var"
        capacity = 2
        "#,
    );

    let loaded: WorkloadConfig = config::from_path(&path).expect("should load");
    std::fs::remove_file(&path).expect("should clean up");

    assert_eq!(loaded.semantics, Semantics::NonBlocking);
    assert_eq!(loaded.buffer.strategy, SyncStrategy::CondVar);
    assert_eq!(loaded.buffer.capacity, 2);
    assert!(loaded.validate().is_ok());
}

/// WHY: configuration mistakes must surface as errors before any thread
/// is started.
/// WHAT: a missing file, bad TOML and impossible pool bounds are each
/// reported with their own error.
#[test]
fn test_config_errors_are_reported() {
    let missing = std::env::temp_dir().join("foundation_sync_does_not_exist.toml");
    assert!(matches!(
        config::from_path::<ExecutorConfig, _>(missing),
        Err(ConfigError::InvalidPath(_))
    ));

    assert!(matches!(
        config::from_str::<ExecutorConfig>("keep_alive = \"sometimes\""),
        Err(ConfigError::DeserializationFailed(_))
    ));

    let inverted = ExecutorConfig::new(4, 2, KeepAlive::Forever);
    assert!(matches!(
        Executor::new(inverted),
        Err(ConfigError::InvalidPoolBounds {
            core_size: 4,
            max_size: 2
        })
    ));

    let mut spinning = ExecutorConfig::default();
    spinning.queue.timed_wait = TimedWait::Polling { interval_ms: 0 };
    assert!(matches!(
        Executor::new(spinning),
        Err(ConfigError::ZeroPollingInterval)
    ));
}
