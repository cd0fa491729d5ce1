// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wall-clock source used for `generated` stamps, backup names and salt
//! snapshot windows.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn epoch_seconds(&self) -> i64 {
        self.now().timestamp()
    }

    fn epoch_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(now.timestamp_millis())),
        }
    }

    pub fn at_seconds(seconds: i64) -> Self {
        Self::at_millis(seconds.saturating_mul(1000))
    }

    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_reports_seconds_and_millis() {
        let clock = ManualClock::at_millis(1_500);
        assert_eq!(clock.epoch_seconds(), 1);
        assert_eq!(clock.epoch_millis(), 1_500);
    }

    #[test]
    fn manual_clock_advances_shared_instant() {
        let clock = ManualClock::at_seconds(10);
        let shared = clock.clone();
        clock.advance(Duration::seconds(5));
        assert_eq!(shared.epoch_seconds(), 15);

        shared.set(DateTime::from_timestamp(100, 0).unwrap());
        assert_eq!(clock.epoch_millis(), 100_000);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.epoch_seconds() > 1_577_836_800);
    }
}
