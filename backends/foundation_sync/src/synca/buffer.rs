use core::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::activity::{NoActivity, SharedActivityLog};
use crate::config::{BufferConfig, SyncStrategy};

use super::{CondVarBuffer, SemaphoreBuffer};

/// `Rejected` hands back an item a buffer refused to take, either because
/// it was full or because the deadline passed first.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rejected<T>(pub T);

impl<T> Rejected<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rejected(..)")
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("buffer refused the item")
    }
}

impl<T> std::error::Error for Rejected<T> {}

/// `ProtectedBuffer` is a thread-safe FIFO of bounded capacity.
///
/// | operation | waits                         | on failure        |
/// |-----------|-------------------------------|-------------------|
/// | `get`     | until an item is available    | -                 |
/// | `put`     | until a slot is free          | -                 |
/// | `remove`  | never                         | `None`            |
/// | `add`     | never                         | `Err(Rejected)`   |
/// | `poll`    | until available or `deadline` | `None`            |
/// | `offer`   | until free or `deadline`      | `Err(Rejected)`   |
///
/// Every item inserted is handed to exactly one taker, in insertion order.
/// A `get` on a buffer that nobody ever fills waits forever; callers must
/// guarantee supply or use the bounded variants.
pub trait ProtectedBuffer<T>: Send + Sync {
    fn get(&self) -> T;

    fn put(&self, item: T);

    fn remove(&self) -> Option<T>;

    fn add(&self, item: T) -> Result<(), Rejected<T>>;

    fn poll(&self, deadline: Instant) -> Option<T>;

    fn offer(&self, item: T, deadline: Instant) -> Result<(), Rejected<T>>;

    /// capacity returns the slot count, 0 when unbounded.
    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SharedBuffer<T> = Arc<dyn ProtectedBuffer<T>>;

/// `build_buffer` constructs the strategy named by `config` with activity
/// recording disabled.
#[must_use]
pub fn build_buffer<T>(config: &BufferConfig) -> SharedBuffer<T>
where
    T: Send + 'static,
{
    build_buffer_with_activity(config, Arc::new(NoActivity))
}

#[must_use]
pub fn build_buffer_with_activity<T>(
    config: &BufferConfig,
    activity: SharedActivityLog<T>,
) -> SharedBuffer<T>
where
    T: Send + 'static,
{
    tracing::debug!(
        strategy = ?config.strategy,
        capacity = config.capacity,
        "building protected buffer"
    );
    match config.strategy {
        SyncStrategy::CondVar => Arc::new(CondVarBuffer::with_activity(config.capacity, activity)),
        SyncStrategy::Semaphore => Arc::new(SemaphoreBuffer::with_activity(
            config.capacity,
            config.timed_wait,
            activity,
        )),
    }
}
