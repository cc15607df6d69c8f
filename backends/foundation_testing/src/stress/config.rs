//! Stress run configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a buffer stress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    /// Number of producer threads
    producers: usize,
    /// Number of consumer threads
    consumers: usize,
    /// Number of unique values each producer inserts
    values_per_producer: usize,
    /// How long a consumer waits for a value before checking whether the
    /// producers are done
    #[serde(with = "millis")]
    idle_timeout: Duration,
    /// Optional maximum duration for the run
    #[serde(with = "optional_millis")]
    duration: Option<Duration>,
}

impl StressConfig {
    /// Creates a new stress configuration with default values.
    ///
    /// Defaults:
    /// - `producers`: 4
    /// - `consumers`: 4
    /// - `values_per_producer`: 1000
    /// - `idle_timeout`: 50ms
    /// - `duration`: None (no time limit)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            producers: 4,
            consumers: 4,
            values_per_producer: 1000,
            idle_timeout: Duration::from_millis(50),
            duration: None,
        }
    }

    /// Sets the number of producer threads.
    #[must_use]
    pub const fn producers(mut self, count: usize) -> Self {
        self.producers = count;
        self
    }

    /// Sets the number of consumer threads.
    #[must_use]
    pub const fn consumers(mut self, count: usize) -> Self {
        self.consumers = count;
        self
    }

    /// Sets the number of values each producer inserts.
    #[must_use]
    pub const fn values_per_producer(mut self, count: usize) -> Self {
        self.values_per_producer = count;
        self
    }

    /// Sets how long an idle consumer waits before re-checking for the end
    /// of the run.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the maximum duration for the run.
    ///
    /// If the duration is reached, producers stop early.
    #[must_use]
    pub const fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Returns the producer count.
    #[must_use]
    pub const fn get_producers(&self) -> usize {
        self.producers
    }

    /// Returns the consumer count.
    #[must_use]
    pub const fn get_consumers(&self) -> usize {
        self.consumers
    }

    /// Returns the number of values per producer.
    #[must_use]
    pub const fn get_values_per_producer(&self) -> usize {
        self.values_per_producer
    }

    /// Returns the consumer idle timeout.
    #[must_use]
    pub const fn get_idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the optional duration.
    #[must_use]
    pub const fn get_duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Returns how many values the run inserts when it is not cut short.
    #[must_use]
    pub const fn expected_values(&self) -> usize {
        self.producers * self.values_per_producer
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self::new()
    }
}

mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod optional_millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|millis| millis.map(Duration::from_millis))
    }
}
