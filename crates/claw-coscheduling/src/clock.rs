//! Injectable time source.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct FakeClock {
    current: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    /// Creates a fake clock frozen at `at`.
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    /// Sets the current time.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }

    /// Advances the clock.
    pub fn step(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += chrono::Duration::from_std(by).unwrap_or_default();
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
