//! `foundation_sync` provides the producer/consumer coordination primitives
//! used across the platform:
//!
//! - [`synca::ProtectedBuffer`]: a thread-safe bounded FIFO with blocking,
//!   non-blocking and deadline-bounded operations, available as a
//!   condition-variable strategy ([`synca::CondVarBuffer`]) and a counting
//!   semaphore strategy ([`synca::SemaphoreBuffer`]).
//! - [`executors::Executor`]: a thread-pool executor bounded by a core and max
//!   size that runs one-shot and periodic [`executors::Callable`]s and hands
//!   their results back through [`executors::TaskFuture`]s.
//!
//! ```
//! use foundation_sync::config::ExecutorConfig;
//! use foundation_sync::executors::{Callable, Executor};
//!
//! let executor = Executor::new(ExecutorConfig::default()).expect("valid config");
//! let future = executor.submit(Callable::new(|| 21 * 2));
//!
//! assert_eq!(future.get_result(), Ok(42));
//! executor.shutdown();
//! ```

pub mod activity;
pub mod clock;
pub mod config;
pub mod executors;
pub mod synca;
