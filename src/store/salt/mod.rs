// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Salt Snapshots
//!
//! Salts are published as a history of time-bounded snapshots. The metadata
//! document lists the retained snapshots in its `salts` array:
//!
//! ```json
//! {
//!   "version": 12,
//!   "generated": 1700000000,
//!   "salts": [
//!     { "effective": 1700000000000, "expires": 1700086400000,
//!       "location": "salts/salts.txt.1700000000000", "size": 1048576 }
//!   ]
//! }
//! ```
//!
//! Each snapshot's content is a CSV file, see [`csv`].

pub mod csv;
pub mod reader;
pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use reader::SaltStoreReader;
pub use writer::{SaltStoreWriter, SnapshotLayout};

use crate::error::{StoreError, StoreResult};
use crate::models::SaltEntry;
use crate::storage::CloudPath;

pub const SALTS_DATA_TYPE: &str = "salts";
pub const SALTS_FIELD: &str = "salts";

/// One generation of salts, valid from `effective` until `expires`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltSnapshot {
    pub effective: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub entries: Vec<SaltEntry>,
}

impl SaltSnapshot {
    pub fn new(effective: DateTime<Utc>, expires: DateTime<Utc>, entries: Vec<SaltEntry>) -> Self {
        Self {
            effective,
            expires,
            entries,
        }
    }

    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.effective <= now && now < self.expires
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }
}

/// Entry of the metadata `salts` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Epoch millis.
    pub effective: i64,
    /// Epoch millis.
    pub expires: i64,
    pub location: CloudPath,
    pub size: usize,
}

impl SnapshotInfo {
    pub fn describe(snapshot: &SaltSnapshot, location: CloudPath) -> Self {
        Self {
            effective: snapshot.effective.timestamp_millis(),
            expires: snapshot.expires.timestamp_millis(),
            location,
            size: snapshot.entries.len(),
        }
    }

    pub fn effective_at(&self) -> StoreResult<DateTime<Utc>> {
        from_millis(self.effective, "effective")
    }

    pub fn expires_at(&self) -> StoreResult<DateTime<Utc>> {
        from_millis(self.expires, "expires")
    }
}

fn from_millis(millis: i64, field: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StoreError::MalformedContent(format!("salt snapshot {field} out of range: {millis}"))
    })
}

/// Sort by effective time and drop snapshots that should not be published.
///
/// Expired snapshots are dropped. Among snapshots effective at `now` only
/// the one that became effective last is kept. Future snapshots are kept.
pub fn retain_snapshots(mut snapshots: Vec<SaltSnapshot>, now: DateTime<Utc>) -> Vec<SaltSnapshot> {
    snapshots.sort_by_key(|snapshot| snapshot.effective);
    let mut newest_effective = snapshots.iter().rposition(|snapshot| snapshot.is_effective(now));

    let mut retained = Vec::with_capacity(snapshots.len());
    for (index, snapshot) in snapshots.into_iter().enumerate() {
        if snapshot.is_expired(now) {
            tracing::info!(
                effective = %snapshot.effective,
                expires = %snapshot.expires,
                "Skipping expired snapshot"
            );
            continue;
        }
        if newest_effective.is_some_and(|newest| newest != index) {
            tracing::info!(
                effective = %snapshot.effective,
                expires = %snapshot.expires,
                "Skipping effective snapshot in favour of a newer one"
            );
            continue;
        }
        retained.push(snapshot);
        newest_effective = None;
    }
    retained
}

/// Infos whose snapshot [`retain_snapshots`] could still keep at `now`,
/// whatever snapshots are added alongside them.
pub fn live_infos(infos: Vec<SnapshotInfo>, now: DateTime<Utc>) -> Vec<SnapshotInfo> {
    let now = now.timestamp_millis();
    let newest_effective = infos
        .iter()
        .filter(|info| info.effective <= now && now < info.expires)
        .map(|info| info.effective)
        .max();
    infos
        .into_iter()
        .filter(|info| now < info.expires)
        .filter(|info| newest_effective.is_none_or(|newest| info.effective >= newest))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    pub(crate) fn snapshot(effective: i64, expires: i64) -> SaltSnapshot {
        SaltSnapshot::new(
            at(effective),
            at(expires),
            vec![SaltEntry::new(1, effective, format!("salt-{effective}"))],
        )
    }

    fn windows(snapshots: &[SaltSnapshot]) -> Vec<(i64, i64)> {
        snapshots
            .iter()
            .map(|s| (s.effective.timestamp_millis(), s.expires.timestamp_millis()))
            .collect()
    }

    #[test]
    fn effective_window_is_half_open() {
        let s = snapshot(10, 20);
        assert!(!s.is_effective(at(9)));
        assert!(s.is_effective(at(10)));
        assert!(s.is_effective(at(19)));
        assert!(!s.is_effective(at(20)));
        assert!(s.is_expired(at(20)));
    }

    #[test]
    fn newest_effective_supersedes_older() {
        let retained = retain_snapshots(
            vec![snapshot(15, 25), snapshot(18, 28), snapshot(10, 20)],
            at(18),
        );
        assert_eq!(windows(&retained), vec![(18, 28)]);
    }

    #[test]
    fn expired_dropped_and_future_kept() {
        let retained = retain_snapshots(
            vec![snapshot(1, 5), snapshot(10, 20), snapshot(30, 40), snapshot(50, 60)],
            at(12),
        );
        assert_eq!(windows(&retained), vec![(10, 20), (30, 40), (50, 60)]);
    }

    #[test]
    fn without_effective_snapshot_keeps_unexpired() {
        let retained = retain_snapshots(vec![snapshot(30, 40), snapshot(1, 2)], at(10));
        assert_eq!(windows(&retained), vec![(30, 40)]);
    }

    fn info(effective: i64, expires: i64) -> SnapshotInfo {
        SnapshotInfo {
            effective,
            expires,
            location: CloudPath::new(format!("salts/salts.txt.{effective}")),
            size: 1,
        }
    }

    #[test]
    fn live_infos_match_retained_windows() {
        let infos = vec![info(1, 5), info(10, 20), info(15, 25), info(30, 40)];
        let live: Vec<(i64, i64)> = live_infos(infos, at(18))
            .iter()
            .map(|i| (i.effective, i.expires))
            .collect();
        assert_eq!(live, vec![(15, 25), (30, 40)]);
    }

    #[test]
    fn live_infos_keep_future_without_effective() {
        let live = live_infos(vec![info(30, 40), info(1, 2)], at(10));
        assert_eq!(live, vec![info(30, 40)]);
    }

    #[test]
    fn info_describes_snapshot() {
        let info = SnapshotInfo::describe(&snapshot(10, 20), CloudPath::new("salts/salts.txt.10"));
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            serde_json::json!({
                "effective": 10,
                "expires": 20,
                "location": "salts/salts.txt.10",
                "size": 1
            })
        );
        assert_eq!(info.effective_at().unwrap(), at(10));
    }
}
