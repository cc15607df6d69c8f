// Counting semaphore built from a mutex-guarded permit count and a
// condition variable.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::config::TimedWait;

use super::{lock_recovering, wait_recovering, wait_timeout_recovering};

/// `Semaphore` hands out permits; acquiring blocks while none are left and
/// every [`Semaphore::release`] returns one permit and wakes one waiter.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        *lock_recovering(&self.permits)
    }

    /// acquire takes a permit, blocking until one is released.
    pub fn acquire(&self) {
        let mut permits = lock_recovering(&self.permits);
        while *permits == 0 {
            permits = wait_recovering(&self.available, permits);
        }
        *permits -= 1;
    }

    /// `try_acquire` takes a permit only if one is free right now.
    pub fn try_acquire(&self) -> bool {
        let mut permits = lock_recovering(&self.permits);
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// `acquire_until` blocks on the permit condition until a permit is
    /// taken or `deadline` passes. Returns false on timeout without having
    /// touched the count.
    pub fn acquire_until(&self, deadline: Instant) -> bool {
        let mut permits = lock_recovering(&self.permits);
        loop {
            if *permits > 0 {
                *permits -= 1;
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            permits = wait_timeout_recovering(&self.available, permits, deadline - now);
        }
    }

    /// `acquire_until_polling` is the fallback for platforms lacking a timed
    /// wait: it only ever calls [`Semaphore::try_acquire`], sleeping at most
    /// `interval` between attempts and never sleeping past `deadline`.
    pub fn acquire_until_polling(&self, deadline: Instant, interval: Duration) -> bool {
        loop {
            if self.try_acquire() {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(interval.min(deadline - now));
        }
    }

    /// `acquire_within` picks the timed acquire matching `strategy`.
    pub fn acquire_within(&self, deadline: Instant, strategy: &TimedWait) -> bool {
        match strategy {
            TimedWait::Native => self.acquire_until(deadline),
            TimedWait::Polling { interval_ms } => {
                self.acquire_until_polling(deadline, Duration::from_millis((*interval_ms).max(1)))
            }
        }
    }

    pub fn release(&self) {
        let mut permits = lock_recovering(&self.permits);
        *permits += 1;
        drop(permits);
        self.available.notify_one();
    }
}
