// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Publishes salt snapshots and the metadata listing them.

use std::sync::Arc;

use super::{
    csv, retain_snapshots, SaltSnapshot, SaltStoreReader, SnapshotInfo, SALTS_DATA_TYPE,
    SALTS_FIELD,
};
use crate::error::StoreResult;
use crate::models::CloudEncryptionKey;
use crate::storage::{CloudPath, FileName};
use crate::store::clock::Clock;
use crate::store::file_manager::FileManager;
use crate::store::metadata::Metadata;
use crate::store::version::VersionGenerator;
use crate::store::writer::{
    EncryptedEnvelope, EncryptionKeyProvider, Listeners, StoreListener, WriteEvent,
};

const KEY_ID_FIELD: &str = "key_id";

/// Where snapshot files go and how they are written.
#[derive(Clone)]
pub enum SnapshotLayout {
    /// Plain CSV at `<prefix><effective millis>`. Existing files are never
    /// rewritten.
    PlainSnapshots { prefix: String },
    /// Encrypted envelope at `salts.txt.<effective millis>` inside the
    /// reader's scope. Existing files are rewritten when the site's active
    /// key differs from the one recorded in metadata.
    EncryptedSnapshots {
        site_id: i32,
        keys: Arc<dyn EncryptionKeyProvider>,
    },
}

/// Writes snapshot files for the snapshots worth keeping, then the
/// metadata document listing them.
pub struct SaltStoreWriter {
    files: FileManager,
    versions: Arc<dyn VersionGenerator>,
    clock: Arc<dyn Clock>,
    reader: Arc<SaltStoreReader>,
    layout: SnapshotLayout,
    listeners: Listeners,
}

impl SaltStoreWriter {
    /// The reader supplies the current snapshots and reloads after each write.
    pub fn new(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        reader: Arc<SaltStoreReader>,
        layout: SnapshotLayout,
    ) -> Self {
        let mut listeners = Listeners::default();
        listeners.push(reader.clone());
        Self {
            files,
            versions,
            clock,
            reader,
            layout,
            listeners,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn StoreListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn reader(&self) -> &Arc<SaltStoreReader> {
        &self.reader
    }

    /// Add `snapshot` to the stored history and publish the result.
    ///
    /// Stored snapshots that can no longer be published are not downloaded.
    pub fn upload(&self, snapshot: SaltSnapshot) -> StoreResult<Metadata> {
        let mut snapshots = self.reader.read_live(self.clock.now())?;
        snapshots.push(snapshot);
        self.publish(snapshots)
    }

    /// Publish exactly `snapshots`, minus expired and superseded ones.
    pub fn publish(&self, snapshots: Vec<SaltSnapshot>) -> StoreResult<Metadata> {
        let metadata_path = self.reader.metadata_path();
        let existing = self.reader.get_metadata()?;
        let generated = self.clock.epoch_seconds();
        let active_key = match &self.layout {
            SnapshotLayout::PlainSnapshots { .. } => None,
            SnapshotLayout::EncryptedSnapshots { site_id, keys } => {
                Some(keys.key_for_site(*site_id)?)
            }
        };
        let candidate_version = self.versions.next_version()?;

        if existing.is_some() {
            self.files
                .backup_file(&metadata_path, &FileName::json("salts-old"), generated)?;
        }

        let recorded_key_id = existing
            .as_ref()
            .and_then(|metadata| metadata.get(KEY_ID_FIELD))
            .and_then(|value| value.as_i64());

        let retained = retain_snapshots(snapshots, self.clock.now());
        let mut infos = Vec::with_capacity(retained.len());
        let mut written = 0;
        for snapshot in &retained {
            let location = self.location(snapshot);
            if self.write_snapshot(snapshot, &location, active_key.as_ref(), recorded_key_id)? {
                written += 1;
            }
            infos.push(SnapshotInfo::describe(snapshot, location));
        }

        let mut metadata = existing.unwrap_or_default();
        metadata.advance_version(candidate_version);
        metadata.set_generated(generated);
        metadata.insert(SALTS_FIELD, serde_json::to_value(&infos)?);
        if let Some(key) = &active_key {
            metadata.insert(KEY_ID_FIELD, key.id);
        }
        self.files
            .upload_metadata(&metadata, SALTS_DATA_TYPE, &metadata_path)?;

        let version = metadata.version().unwrap_or_default();
        tracing::info!(
            scope = %self.reader.scope(),
            version,
            retained = infos.len(),
            written,
            "Published salt snapshots"
        );

        self.listeners.notify(&WriteEvent {
            data_type: SALTS_DATA_TYPE.to_string(),
            metadata_path,
            version,
        })?;
        Ok(metadata)
    }

    fn location(&self, snapshot: &SaltSnapshot) -> CloudPath {
        let millis = snapshot.effective.timestamp_millis();
        match &self.layout {
            SnapshotLayout::PlainSnapshots { prefix } => CloudPath::new(format!("{prefix}{millis}")),
            SnapshotLayout::EncryptedSnapshots { .. } => {
                self.reader.scope().resolve(&format!("salts.txt.{millis}"))
            }
        }
    }

    /// Returns whether the file was written.
    fn write_snapshot(
        &self,
        snapshot: &SaltSnapshot,
        location: &CloudPath,
        active_key: Option<&CloudEncryptionKey>,
        recorded_key_id: Option<i64>,
    ) -> StoreResult<bool> {
        let exists = self.files.exists(location)?;
        let name = FileName::new("salts", ".txt");

        match active_key {
            None => {
                if exists {
                    return Ok(false);
                }
                let content = csv::to_csv(&snapshot.entries);
                self.files.upload_file(location, &name, content.as_bytes())?;
            }
            Some(key) => {
                if exists && recorded_key_id == Some(i64::from(key.id)) {
                    tracing::info!(
                        location = %location,
                        key_id = key.id,
                        "Snapshot already encrypted with the active key"
                    );
                    return Ok(false);
                }
                let content = csv::to_legacy_csv(&snapshot.entries);
                let envelope = EncryptedEnvelope::seal(content.as_bytes(), key)?;
                self.files
                    .upload_file(location, &name, envelope.to_pretty_json()?.as_bytes())?;
                tracing::info!(
                    site_id = key.site_id,
                    key_id = key.id,
                    data_type = SALTS_DATA_TYPE,
                    "File encryption completed"
                );
            }
        }
        Ok(true)
    }
}
