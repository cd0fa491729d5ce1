// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Metadata version generators.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::clock::Clock;
use super::metadata::Metadata;
use crate::error::StoreResult;

/// Supplies the `version` stamped on each write.
pub trait VersionGenerator: Send + Sync {
    fn next_version(&self) -> StoreResult<i64>;
}

/// Anything that can report the metadata currently stored for a data type.
pub trait MetadataSource: Send + Sync {
    /// `None` when nothing has been written yet.
    fn current_metadata(&self) -> StoreResult<Option<Metadata>>;
}

/// Uses the clock's epoch millis as the version, bumped past the last
/// version it handed out when the clock has not moved.
pub struct EpochVersionGenerator {
    clock: Arc<dyn Clock>,
    last: AtomicI64,
}

impl EpochVersionGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: AtomicI64::new(i64::MIN),
        }
    }
}

impl VersionGenerator for EpochVersionGenerator {
    fn next_version(&self) -> StoreResult<i64> {
        let now = self.clock.epoch_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        Ok(now.max(previous.saturating_add(1)))
    }
}

/// Increments the stored version; starts at 1.
pub struct ConsecutiveVersionGenerator {
    source: Arc<dyn MetadataSource>,
}

impl ConsecutiveVersionGenerator {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source }
    }
}

impl VersionGenerator for ConsecutiveVersionGenerator {
    fn next_version(&self) -> StoreResult<i64> {
        let current = self
            .source
            .current_metadata()?
            .and_then(|metadata| metadata.version());
        Ok(current.map_or(1, |version| version + 1))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::clock::ManualClock;
    use chrono::Duration;
    use std::thread;

    /// Returns 1, 2, 3, ... on successive calls.
    #[derive(Default)]
    pub(crate) struct CountingVersions(AtomicI64);

    impl VersionGenerator for CountingVersions {
        fn next_version(&self) -> StoreResult<i64> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    struct FixedSource(Option<Metadata>);

    impl MetadataSource for FixedSource {
        fn current_metadata(&self) -> StoreResult<Option<Metadata>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn epoch_version_is_clock_millis() {
        let generator = EpochVersionGenerator::new(Arc::new(ManualClock::at_millis(500)));
        assert_eq!(generator.next_version().unwrap(), 500);
    }

    #[test]
    fn epoch_version_increases_on_a_stopped_clock() {
        let generator = EpochVersionGenerator::new(Arc::new(ManualClock::at_millis(500)));
        let versions: Vec<i64> = (0..5).map(|_| generator.next_version().unwrap()).collect();
        assert_eq!(versions, vec![500, 501, 502, 503, 504]);
    }

    #[test]
    fn epoch_version_catches_up_with_clock() {
        let clock = Arc::new(ManualClock::at_millis(500));
        let generator = EpochVersionGenerator::new(clock.clone());
        assert_eq!(generator.next_version().unwrap(), 500);
        assert_eq!(generator.next_version().unwrap(), 501);
        clock.advance(Duration::milliseconds(400));
        assert_eq!(generator.next_version().unwrap(), 900);
    }

    #[test]
    fn epoch_versions_are_unique_across_threads() {
        let generator = Arc::new(EpochVersionGenerator::new(Arc::new(ManualClock::at_millis(1))));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|_| generator.next_version().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut versions: Vec<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        versions.sort_unstable();
        versions.dedup();
        assert_eq!(versions.len(), 200);
    }

    #[test]
    fn consecutive_increments_previous_version() {
        let mut metadata = Metadata::new();
        metadata.set_version(5);
        let generator = ConsecutiveVersionGenerator::new(Arc::new(FixedSource(Some(metadata))));
        assert_eq!(generator.next_version().unwrap(), 6);
    }

    #[test]
    fn consecutive_starts_at_one() {
        let generator = ConsecutiveVersionGenerator::new(Arc::new(FixedSource(None)));
        assert_eq!(generator.next_version().unwrap(), 1);
    }

    #[test]
    fn counting_versions_increase() {
        let versions = CountingVersions::default();
        assert_eq!(versions.next_version().unwrap(), 1);
        assert_eq!(versions.next_version().unwrap(), 2);
    }
}
