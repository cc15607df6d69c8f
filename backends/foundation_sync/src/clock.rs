// Monotonic clock helpers shared by the timed buffer operations, the
// executor keep-alive and periodic release times.

use std::time::{Duration, Instant};

/// now returns the current monotonic instant.
#[inline]
#[must_use]
pub fn now() -> Instant {
    Instant::now()
}

/// deadline returns the instant `millis` milliseconds after `from`.
#[inline]
#[must_use]
pub fn deadline(from: Instant, millis: u64) -> Instant {
    from + Duration::from_millis(millis)
}

/// `deadline_after` returns the instant `dur` from now.
#[inline]
#[must_use]
pub fn deadline_after(dur: Duration) -> Instant {
    Instant::now() + dur
}

/// `sleep_until` blocks the current thread until `target` has passed.
///
/// Parking may end early (spurious wake-ups or an unpark from elsewhere),
/// so we keep parking for whatever remains until the instant is behind us.
/// A target already in the past returns immediately.
pub fn sleep_until(target: Instant) {
    loop {
        let current = Instant::now();
        if current >= target {
            return;
        }
        std::thread::park_timeout(target - current);
    }
}

/// `RelativeClock` reports time elapsed since it was started, used to
/// stamp activity records the same way across a whole run.
#[derive(Clone, Copy, Debug)]
pub struct RelativeClock {
    started: Instant,
}

impl Default for RelativeClock {
    fn default() -> Self {
        Self::start()
    }
}

impl RelativeClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `elapsed_millis` saturates at `u64::MAX`.
    #[must_use]
    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
