//! Periodic producer/consumer workload over a configurable protected buffer.
//!
//! Producers and consumers each run on their own thread and release one
//! operation per period, measured from a shared start instant so the
//! schedule does not drift. The operation pair is picked by [`Semantics`].

use core::fmt;
use core::time::Duration;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use derive_more::derive::From;
use foundation_sync::activity::TracingActivity;
use foundation_sync::clock::{self, RelativeClock};
use foundation_sync::config::{BufferConfig, ConfigError};
use foundation_sync::synca::{build_buffer_with_activity, SharedBuffer};
use serde::{Deserialize, Serialize};

/// Which buffer operations the workload uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Semantics {
    /// `put` / `get`
    #[default]
    Blocking,
    /// `add` / `remove`
    NonBlocking,
    /// `offer` / `poll`, each bounded by `timeout_ms`
    Timed { timeout_ms: u64 },
}

impl Semantics {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::NonBlocking => "non_blocking",
            Self::Timed { .. } => "timed",
        }
    }
}

impl fmt::Display for Semantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workload description, loadable from TOML.
///
/// ```toml
/// values = 12
/// producers = 2
/// consumers = 3
/// producer_period_ms = 5
/// consumer_period_ms = 10
///
/// [semantics]
/// mode = "timed"
/// timeout_ms = 20
///
/// [buffer]
/// strategy = "semaphore"
/// capacity = 4
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub buffer: BufferConfig,
    pub semantics: Semantics,
    /// values produced in total, split evenly among producers; consumers
    /// attempt the same total between them.
    pub values: usize,
    pub producers: usize,
    pub consumers: usize,
    pub producer_period_ms: u64,
    pub consumer_period_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            semantics: Semantics::default(),
            values: 20,
            producers: 2,
            consumers: 2,
            producer_period_ms: 10,
            consumer_period_ms: 10,
        }
    }
}

#[derive(Debug, From)]
pub enum WorkloadError {
    Config(ConfigError),

    /// no producer or no consumer was configured.
    #[from(ignore)]
    NoParticipants,

    /// with blocking semantics every producer insertion needs a matching
    /// removal, otherwise some participant waits forever.
    #[from(ignore)]
    UnevenSplit {
        values: usize,
        producers: usize,
        consumers: usize,
    },
}

impl std::error::Error for WorkloadError {}

impl fmt::Display for WorkloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type WorkloadResult<T> = std::result::Result<T, WorkloadError>;

impl WorkloadConfig {
    pub fn validate(&self) -> WorkloadResult<()> {
        self.buffer.validate()?;

        if self.producers == 0 || self.consumers == 0 {
            return Err(WorkloadError::NoParticipants);
        }

        let uneven = self.values % self.producers != 0 || self.values % self.consumers != 0;
        if self.semantics == Semantics::Blocking && uneven {
            return Err(WorkloadError::UnevenSplit {
                values: self.values,
                producers: self.producers,
                consumers: self.consumers,
            });
        }
        Ok(())
    }
}

/// What a workload run observed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadReport {
    /// values accepted by the buffer, per producer.
    pub produced: Vec<Vec<u64>>,
    /// values taken out of the buffer, per consumer, in the order observed.
    pub consumed: Vec<Vec<u64>>,
    /// insertions the buffer refused (full, or deadline passed).
    pub refused_inserts: usize,
    /// removals that came back empty-handed.
    pub empty_removals: usize,
    /// values still buffered when every participant finished.
    pub left_in_buffer: usize,
    pub elapsed: Duration,
}

impl WorkloadReport {
    #[must_use]
    pub fn total_produced(&self) -> usize {
        self.produced.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn total_consumed(&self) -> usize {
        self.consumed.iter().map(Vec::len).sum()
    }

    /// every consumed value, sorted.
    #[must_use]
    pub fn consumed_values(&self) -> Vec<u64> {
        let mut values: Vec<u64> = self.consumed.iter().flatten().copied().collect();
        values.sort_unstable();
        values
    }
}

/// Runs periodic producers and consumers against one buffer.
///
/// # Examples
///
/// ```
/// use foundation_testing::scenarios::{ProducerConsumerWorkload, WorkloadConfig};
///
/// let config = WorkloadConfig {
///     values: 6,
///     producers: 2,
///     consumers: 3,
///     producer_period_ms: 1,
///     consumer_period_ms: 1,
///     ..WorkloadConfig::default()
/// };
///
/// let report = ProducerConsumerWorkload::new(config).expect("valid workload").run();
/// assert_eq!(report.consumed_values(), vec![0, 1, 2, 3, 4, 5]);
/// ```
pub struct ProducerConsumerWorkload {
    config: WorkloadConfig,
    buffer: SharedBuffer<u64>,
    clock: RelativeClock,
}

impl ProducerConsumerWorkload {
    /// Builds the buffer described by `config`, recording its activity as
    /// `tracing` debug events.
    pub fn new(config: WorkloadConfig) -> WorkloadResult<Self> {
        config.validate()?;

        let clock = RelativeClock::start();
        let buffer = build_buffer_with_activity(
            &config.buffer,
            Arc::new(TracingActivity::with_clock("workload", clock)),
        );
        Ok(Self {
            config,
            buffer,
            clock,
        })
    }

    #[must_use]
    pub fn buffer(&self) -> &SharedBuffer<u64> {
        &self.buffer
    }

    /// Runs every participant to completion.
    ///
    /// # Panics
    ///
    /// Panics if a participant thread panics.
    #[must_use]
    pub fn run(self) -> WorkloadReport {
        let config = self.config;
        let started = clock::now();

        let per_producer = config.values / config.producers;
        let per_consumer = config.values / config.consumers;

        let consumers: Vec<_> = (0..config.consumers)
            .map(|index| {
                let participant = self.participant(format!("consumer-{index}"), started);
                thread::spawn(move || {
                    participant.periodic(per_consumer, config.consumer_period_ms, |buffer| {
                        consume(buffer, config.semantics)
                    })
                })
            })
            .collect();

        let producers: Vec<_> = (0..config.producers)
            .map(|index| {
                let participant = self.participant(format!("producer-{index}"), started);
                let mut next = (index * per_producer) as u64;
                thread::spawn(move || {
                    participant.periodic(per_producer, config.producer_period_ms, |buffer| {
                        let outcome = produce(buffer, config.semantics, next);
                        next += 1;
                        outcome
                    })
                })
            })
            .collect();

        let mut report = WorkloadReport::default();
        for handle in producers {
            let tally = handle.join().expect("workload producer panicked");
            report.refused_inserts += tally.refused;
            report.produced.push(tally.values);
        }
        for handle in consumers {
            let tally = handle.join().expect("workload consumer panicked");
            report.empty_removals += tally.refused;
            report.consumed.push(tally.values);
        }

        report.left_in_buffer = self.buffer.len();
        report.elapsed = started.elapsed();

        tracing::info!(
            produced = report.total_produced(),
            consumed = report.total_consumed(),
            refused_inserts = report.refused_inserts,
            empty_removals = report.empty_removals,
            left_in_buffer = report.left_in_buffer,
            "workload finished"
        );
        report
    }

    fn participant(&self, name: String, started: Instant) -> Participant {
        Participant {
            name,
            buffer: Arc::clone(&self.buffer),
            clock: self.clock,
            started,
        }
    }
}

struct Tally {
    values: Vec<u64>,
    refused: usize,
}

struct Participant {
    name: String,
    buffer: SharedBuffer<u64>,
    clock: RelativeClock,
    started: Instant,
}

impl Participant {
    /// releases `count` operations, the n-th one `n * period_ms` after the
    /// shared start.
    fn periodic<F>(&self, count: usize, period_ms: u64, mut operation: F) -> Tally
    where
        F: FnMut(&SharedBuffer<u64>) -> Option<u64>,
    {
        let span = tracing::info_span!("participant", name = %self.name);
        let _entered = span.enter();

        let mut tally = Tally {
            values: Vec::with_capacity(count),
            refused: 0,
        };
        let mut release = self.started;

        for _ in 0..count {
            release = clock::deadline(release, period_ms);

            if let Some(value) = operation(&self.buffer) {
                tracing::info!(elapsed_ms = self.clock.elapsed_millis(), value, "done");
                tally.values.push(value);
            } else {
                tracing::info!(elapsed_ms = self.clock.elapsed_millis(), "refused");
                tally.refused += 1;
            }

            clock::sleep_until(release);
        }
        tally
    }
}

fn operation_deadline(semantics: Semantics) -> Instant {
    match semantics {
        Semantics::Timed { timeout_ms } => clock::deadline(clock::now(), timeout_ms),
        Semantics::Blocking | Semantics::NonBlocking => clock::now(),
    }
}

/// returns the value when the buffer accepted it.
fn produce(buffer: &SharedBuffer<u64>, semantics: Semantics, value: u64) -> Option<u64> {
    let accepted = match semantics {
        Semantics::Blocking => {
            buffer.put(value);
            true
        }
        Semantics::NonBlocking => buffer.add(value).is_ok(),
        Semantics::Timed { .. } => buffer.offer(value, operation_deadline(semantics)).is_ok(),
    };
    accepted.then_some(value)
}

fn consume(buffer: &SharedBuffer<u64>, semantics: Semantics) -> Option<u64> {
    match semantics {
        Semantics::Blocking => Some(buffer.get()),
        Semantics::NonBlocking => buffer.remove(),
        Semantics::Timed { .. } => buffer.poll(operation_deadline(semantics)),
    }
}
