mod buffer;
mod cond_buffer;
mod ring;
mod sem_buffer;
mod semaphore;

pub use buffer::*;
pub use cond_buffer::*;
pub use ring::*;
pub use sem_buffer::*;
pub use semaphore::*;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// A panic while one of our locks is held cannot leave the guarded state torn
// (ring store and counter updates are single assignments), so a poisoned
// guard is taken over as-is.

pub(crate) fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait_recovering<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
) -> MutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait_timeout_recovering<'a, T>(
    condvar: &Condvar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> MutexGuard<'a, T> {
    match condvar.wait_timeout(guard, timeout) {
        Ok((guard, _)) => guard,
        Err(poisoned) => poisoned.into_inner().0,
    }
}
