//! Atomic counter paired with a last-update timestamp.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;

/// A monotone counter that remembers when it was last bumped.
///
/// The value and timestamp are separate atomics updated value-first, so a
/// reader never observes a timestamp without the increment it belongs to.
/// A timestamp of zero means the counter has never been touched.
#[derive(Debug, Default)]
pub struct TimedCounter {
    value: AtomicU64,
    updated_at_ms: AtomicI64,
}

impl TimedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` to the counter and stamp the current time.
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::AcqRel);
        self.updated_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    /// Increment by one.
    pub fn incr(&self) {
        self.add(1);
    }

    /// Current counter value.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Epoch milliseconds of the last update, or `None` if never updated.
    pub fn last_update_ms(&self) -> Option<i64> {
        match self.updated_at_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_with_no_timestamp() {
        let c = TimedCounter::new();
        assert_eq!(c.value(), 0);
        assert_eq!(c.last_update_ms(), None);
    }

    #[test]
    fn add_accumulates_and_stamps() {
        let c = TimedCounter::new();
        c.incr();
        c.add(4);
        assert_eq!(c.value(), 5);
        assert!(c.last_update_ms().is_some());
    }

    #[test]
    fn timestamps_are_monotone() {
        let c = TimedCounter::new();
        c.incr();
        let first = c.last_update_ms().unwrap();
        c.incr();
        let second = c.last_update_ms().unwrap();
        assert!(second >= first);
    }
}
