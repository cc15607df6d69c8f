//! Stress framework for protected buffers.
//!
//! Runs N producers against M consumers on one shared buffer with:
//! - Unique values per producer, so every loss or duplicate is detectable
//! - Blocking inserts and deadline-bounded removals
//! - Optional time limit
//! - Throughput reporting

use core::time::Duration;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use foundation_sync::clock;
use foundation_sync::synca::SharedBuffer;

pub mod config;

pub use config::StressConfig;

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Values inserted by the producers
    pub produced: usize,
    /// Values taken out by the consumers
    pub consumed: usize,
    /// Values taken out more than once
    pub duplicates: usize,
    /// Values inserted but never taken out
    pub lost: usize,
    /// Total time taken for the run
    pub duration: Duration,
    /// Producer plus consumer threads used
    pub thread_count: usize,
}

impl StressResult {
    /// Returns true when every produced value was consumed exactly once.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.lost == 0 && self.produced == self.consumed
    }

    /// Returns transfers (one insert plus one removal) per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn transfers_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.consumed as f64 / secs
        }
    }
}

/// Buffer stress harness.
///
/// Producers `put` their values and stop early when the configured duration
/// elapses. Consumers `poll` until every produced value was seen or the
/// producers are done and the buffer stays empty for the idle timeout.
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    /// Creates a new stress harness with the given configuration.
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs the configured producers and consumers against `buffer`.
    ///
    /// # Examples
    ///
    /// ```
    /// use foundation_sync::config::{BufferConfig, SyncStrategy};
    /// use foundation_sync::synca::build_buffer;
    /// use foundation_testing::stress::{StressConfig, StressHarness};
    ///
    /// let buffer = build_buffer(&BufferConfig::new(SyncStrategy::Semaphore, 2));
    /// let config = StressConfig::new().producers(3).consumers(2).values_per_producer(100);
    ///
    /// let result = StressHarness::new(config).run(&buffer);
    /// assert!(result.is_clean());
    /// assert_eq!(result.consumed, 300);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if any producer or consumer thread panics.
    #[must_use]
    pub fn run(self, buffer: &SharedBuffer<u64>) -> StressResult {
        let started = clock::now();
        let config = self.config;

        let produced = Arc::new(AtomicUsize::new(0));
        let consumed = Arc::new(AtomicUsize::new(0));
        let producers_done = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        if let Some(duration) = config.get_duration() {
            let stop_flag = Arc::clone(&stop_flag);
            thread::spawn(move || {
                thread::sleep(duration);
                stop_flag.store(true, Ordering::Release);
            });
        }

        let producer_handles: Vec<_> = (0..config.get_producers())
            .map(|producer| {
                let buffer = Arc::clone(buffer);
                let produced = Arc::clone(&produced);
                let stop_flag = Arc::clone(&stop_flag);
                let per_producer = config.get_values_per_producer();

                thread::spawn(move || {
                    for index in 0..per_producer {
                        if stop_flag.load(Ordering::Acquire) {
                            break;
                        }
                        buffer.put((producer * per_producer + index) as u64);
                        produced.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        let consumer_handles: Vec<_> = (0..config.get_consumers())
            .map(|_| {
                let buffer = Arc::clone(buffer);
                let produced = Arc::clone(&produced);
                let consumed = Arc::clone(&consumed);
                let producers_done = Arc::clone(&producers_done);
                let seen = Arc::clone(&seen);
                let idle_timeout = config.get_idle_timeout();

                thread::spawn(move || {
                    let mut local = Vec::new();
                    loop {
                        let done = producers_done.load(Ordering::Acquire);
                        if done && consumed.load(Ordering::Acquire) >= produced.load(Ordering::Acquire) {
                            break;
                        }
                        match buffer.poll(clock::deadline_after(idle_timeout)) {
                            Some(value) => {
                                local.push(value);
                                consumed.fetch_add(1, Ordering::AcqRel);
                            }
                            None if done => break,
                            None => {}
                        }
                    }
                    match seen.lock() {
                        Ok(mut guard) => guard.extend(local),
                        Err(e) => e.into_inner().extend(local),
                    }
                })
            })
            .collect();

        for handle in producer_handles {
            handle.join().expect("Producer panicked during stress run");
        }
        producers_done.store(true, Ordering::Release);

        for handle in consumer_handles {
            handle.join().expect("Consumer panicked during stress run");
        }

        let seen = match seen.lock() {
            Ok(guard) => guard.clone(),
            Err(e) => e.into_inner().clone(),
        };
        let unique: HashSet<u64> = seen.iter().copied().collect();
        let produced = produced.load(Ordering::Acquire);

        let result = StressResult {
            produced,
            consumed: seen.len(),
            duplicates: seen.len() - unique.len(),
            lost: produced.saturating_sub(unique.len()),
            duration: started.elapsed(),
            thread_count: config.get_producers() + config.get_consumers(),
        };

        tracing::info!(
            produced = result.produced,
            consumed = result.consumed,
            duplicates = result.duplicates,
            lost = result.lost,
            elapsed_ms = result.duration.as_millis(),
            "buffer stress run finished"
        );
        result
    }
}
