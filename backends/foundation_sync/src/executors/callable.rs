use core::fmt;
use std::time::Duration;

/// `Callable` is a unit of work for the [`super::Executor`]. A one-shot
/// callable runs once; a periodic one is re-invoked every `period` (measured
/// between release times, not between completions) until the executor shuts
/// down.
pub struct Callable<T> {
    entry: Box<dyn FnMut() -> T + Send + 'static>,
    period: Option<Duration>,
}

impl<T> fmt::Debug for Callable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Callable<T> {
    pub fn new<F>(entry: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let mut entry = Some(entry);
        Self {
            entry: Box::new(move || match entry.take() {
                Some(run) => run(),
                None => unreachable!("one-shot callable invoked twice"),
            }),
            period: None,
        }
    }

    pub fn periodic<F>(period: Duration, entry: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        Self {
            entry: Box::new(entry),
            period: Some(period),
        }
    }

    /// `with_params` binds `params` to a plain entry point, invoked with a
    /// reference to them on every run.
    pub fn with_params<P>(params: P, entry: fn(&P) -> T, period: Option<Duration>) -> Self
    where
        P: Send + 'static,
    {
        Self {
            entry: Box::new(move || entry(&params)),
            period,
        }
    }

    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    #[must_use]
    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }

    pub(crate) fn invoke(&mut self) -> T {
        (self.entry)()
    }
}
