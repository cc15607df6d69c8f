//! Reusable workloads over the `foundation_sync` buffers.
//!
//! Provides:
//! - Periodic producer/consumer runs with selectable operation semantics

pub mod producer_consumer;

pub use producer_consumer::{
    ProducerConsumerWorkload, Semantics, WorkloadConfig, WorkloadError, WorkloadReport,
    WorkloadResult,
};
