//! Reusable stress and workload infrastructure for the `foundation_sync`
//! buffers and executor.
//!
//! This crate provides:
//! - **Stress harness**: N producers against M consumers on one buffer,
//!   checking every value is transferred exactly once
//! - **Workload scenario**: periodic producers and consumers with blocking,
//!   non-blocking or timed operations, configurable from TOML
//! - **Criterion benchmarks**: both buffer strategies side by side
//!
//! # Examples
//!
//! ```rust
//! use foundation_sync::config::{BufferConfig, SyncStrategy};
//! use foundation_sync::synca::build_buffer;
//! use foundation_testing::stress::{StressConfig, StressHarness};
//!
//! let buffer = build_buffer(&BufferConfig::new(SyncStrategy::CondVar, 4));
//! let config = StressConfig::new().producers(4).consumers(4).values_per_producer(250);
//!
//! let result = StressHarness::new(config).run(&buffer);
//!
//! assert_eq!(result.consumed, 1000);
//! assert_eq!(result.duplicates, 0);
//! assert_eq!(result.lost, 0);
//! ```

#![allow(clippy::module_name_repetitions)] // Common for testing crates

pub mod scenarios;
pub mod stress;

// Re-export commonly used items
pub use scenarios::{ProducerConsumerWorkload, WorkloadConfig, WorkloadReport};
pub use stress::{StressConfig, StressHarness, StressResult};
