// Construction-time configuration for buffers and executors.
//
// Every knob lives on these structs and is handed to the constructors; nothing
// is read from process-wide state.

use std::path::PathBuf;
use std::time::Duration;

use derive_more::derive::From;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    InvalidPath(PathBuf),

    /// `core_size` and `max_size` do not describe a usable pool.
    #[from(ignore)]
    InvalidPoolBounds { core_size: usize, max_size: usize },

    /// a polling interval of zero would spin without ever sleeping.
    #[from(ignore)]
    ZeroPollingInterval,
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `from_path` reads a TOML file and deserializes it into `T`.
pub fn from_path<T, V>(target: V) -> ConfigResult<T>
where
    T: DeserializeOwned,
    V: Into<PathBuf>,
{
    let target_path = target.into();
    if !target_path.is_file() {
        return Err(target_path.into());
    }
    let config_content = std::fs::read_to_string(target_path)?;
    from_str(&config_content)
}

pub fn from_str<T>(content: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    Ok(toml::from_str(content)?)
}

/// `SyncStrategy` selects how a protected buffer synchronizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// one mutex plus `not-full`/`not-empty` condition variables.
    #[default]
    CondVar,

    /// one mutex plus `empty-slots`/`full-slots` counting semaphores.
    Semaphore,
}

/// `TimedWait` selects how a semaphore waits with a deadline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimedWait {
    /// block on the semaphore's condition variable with a timeout.
    #[default]
    Native,

    /// fallback for platforms without a timed semaphore wait: retry a
    /// non-blocking acquire, sleeping `interval_ms` between attempts, until
    /// the deadline passes.
    Polling { interval_ms: u64 },
}

impl TimedWait {
    #[must_use]
    pub fn polling(interval: Duration) -> Self {
        Self::Polling {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match self {
            TimedWait::Polling { interval_ms: 0 } => Err(ConfigError::ZeroPollingInterval),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub strategy: SyncStrategy,

    /// number of slots; 0 means the buffer never refuses an insertion.
    pub capacity: usize,

    pub timed_wait: TimedWait,
}

pub const DEFAULT_BUFFER_CAPACITY: usize = 16;

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            strategy: SyncStrategy::default(),
            capacity: DEFAULT_BUFFER_CAPACITY,
            timed_wait: TimedWait::default(),
        }
    }
}

impl BufferConfig {
    #[must_use]
    pub fn new(strategy: SyncStrategy, capacity: usize) -> Self {
        Self {
            strategy,
            capacity,
            timed_wait: TimedWait::default(),
        }
    }

    #[must_use]
    pub fn with_timed_wait(mut self, timed_wait: TimedWait) -> Self {
        self.timed_wait = timed_wait;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.timed_wait.validate()
    }
}

/// `KeepAlive` is how long an idle pool worker waits for work before asking
/// to retire. Written in TOML as either `"forever"` or a number of
/// milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeepAliveRepr", into = "KeepAliveRepr")]
pub enum KeepAlive {
    Forever,
    Idle(Duration),
}

impl KeepAlive {
    #[must_use]
    pub fn millis(millis: u64) -> Self {
        Self::Idle(Duration::from_millis(millis))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum KeepAliveRepr {
    Millis(u64),
    Keyword(String),
}

impl TryFrom<KeepAliveRepr> for KeepAlive {
    type Error = String;

    fn try_from(value: KeepAliveRepr) -> Result<Self, Self::Error> {
        match value {
            KeepAliveRepr::Millis(millis) => Ok(KeepAlive::millis(millis)),
            KeepAliveRepr::Keyword(word) if word.eq_ignore_ascii_case("forever") => {
                Ok(KeepAlive::Forever)
            }
            KeepAliveRepr::Keyword(word) => Err(format!(
                "keep_alive must be \"forever\" or milliseconds, got {word:?}"
            )),
        }
    }
}

impl From<KeepAlive> for KeepAliveRepr {
    fn from(value: KeepAlive) -> Self {
        match value {
            KeepAlive::Forever => KeepAliveRepr::Keyword(String::from("forever")),
            KeepAlive::Idle(dur) => {
                KeepAliveRepr::Millis(u64::try_from(dur.as_millis()).unwrap_or(u64::MAX))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// workers kept alive while idle.
    pub core_size: usize,

    /// hard cap on concurrently live workers.
    pub max_size: usize,

    pub keep_alive: KeepAlive,

    /// the queue of futures waiting for a worker.
    pub queue: BufferConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_size: 2,
            max_size: 4,
            keep_alive: KeepAlive::millis(1_000),
            queue: BufferConfig::default(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn new(core_size: usize, max_size: usize, keep_alive: KeepAlive) -> Self {
        Self {
            core_size,
            max_size,
            keep_alive,
            queue: BufferConfig::default(),
        }
    }

    #[must_use]
    pub fn with_queue(mut self, queue: BufferConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 || self.core_size > self.max_size {
            return Err(ConfigError::InvalidPoolBounds {
                core_size: self.core_size,
                max_size: self.max_size,
            });
        }
        self.queue.validate()
    }
}
