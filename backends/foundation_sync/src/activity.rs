// Observability hook invoked by the protected buffers on every operation.

use core::fmt;
use std::sync::Arc;

use crate::clock::RelativeClock;

/// `Action` names the buffer operation being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Get,
    Put,
    Remove,
    Add,
    Poll,
    Offer,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Put => "put",
            Action::Remove => "remove",
            Action::Add => "add",
            Action::Poll => "poll",
            Action::Offer => "offer",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ActivityLog` receives one record per buffer operation. `item` is `None`
/// when the operation did not move a value (refused or timed out).
///
/// Implementations are called while the buffer's exclusion is held, so they
/// must not block and must never panic.
pub trait ActivityLog<T>: Send + Sync {
    fn record(&self, action: Action, item: Option<&T>);
}

pub type SharedActivityLog<T> = Arc<dyn ActivityLog<T>>;

/// `NoActivity` discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoActivity;

impl<T> ActivityLog<T> for NoActivity {
    #[inline]
    fn record(&self, _action: Action, _item: Option<&T>) {}
}

/// `TracingActivity` emits a `debug` event per record, stamped with the
/// milliseconds elapsed on its [`RelativeClock`]. The caller's identity comes
/// from whatever span is entered at the time (pool workers enter one carrying
/// their worker id).
#[derive(Clone, Debug)]
pub struct TracingActivity {
    name: &'static str,
    clock: RelativeClock,
}

impl TracingActivity {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_clock(name, RelativeClock::start())
    }

    #[must_use]
    pub fn with_clock(name: &'static str, clock: RelativeClock) -> Self {
        Self { name, clock }
    }
}

impl<T: fmt::Debug> ActivityLog<T> for TracingActivity {
    fn record(&self, action: Action, item: Option<&T>) {
        match item {
            Some(value) => tracing::debug!(
                buffer = self.name,
                elapsed_ms = self.clock.elapsed_millis(),
                action = %action,
                item = ?value,
                "buffer activity"
            ),
            None => tracing::debug!(
                buffer = self.name,
                elapsed_ms = self.clock.elapsed_millis(),
                action = %action,
                "buffer activity (nothing moved)"
            ),
        }
    }
}
