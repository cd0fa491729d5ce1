// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cached reader for published salt snapshots.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::{csv, live_infos, SaltSnapshot, SnapshotInfo, SALTS_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::storage::CloudPath;
use crate::store::file_manager::FileManager;
use crate::store::metadata::Metadata;
use crate::store::scope::StoreScope;
use crate::store::version::MetadataSource;
use crate::store::writer::{decrypt_envelope, EncryptionKeyProvider, StoreListener, WriteEvent};

#[derive(Default)]
struct Loaded {
    snapshots: Vec<SaltSnapshot>,
    metadata: Option<Metadata>,
}

/// Reads the snapshot list of one scope and caches the last load.
pub struct SaltStoreReader {
    files: FileManager,
    scope: StoreScope,
    keys: Option<Arc<dyn EncryptionKeyProvider>>,
    cache: RwLock<Loaded>,
}

impl SaltStoreReader {
    pub fn new(files: FileManager, scope: StoreScope) -> Self {
        Self {
            files,
            scope,
            keys: None,
            cache: RwLock::new(Loaded::default()),
        }
    }

    /// Reader for snapshot files stored as encrypted envelopes.
    pub fn with_decryption(
        files: FileManager,
        scope: StoreScope,
        keys: Arc<dyn EncryptionKeyProvider>,
    ) -> Self {
        Self {
            keys: Some(keys),
            ..Self::new(files, scope)
        }
    }

    pub fn scope(&self) -> &StoreScope {
        &self.scope
    }

    pub fn metadata_path(&self) -> CloudPath {
        self.scope.metadata_path()
    }

    pub fn get_metadata(&self) -> StoreResult<Option<Metadata>> {
        match self.files.download_metadata(&self.metadata_path()) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parse the `salts` array of `metadata`.
    pub fn snapshot_infos(&self, metadata: &Metadata) -> StoreResult<Vec<SnapshotInfo>> {
        let salts = metadata
            .get(SALTS_FIELD)
            .ok_or_else(|| StoreError::MalformedMetadata {
                path: self.metadata_path().to_string(),
                reason: format!("missing {SALTS_FIELD}"),
            })?;
        serde_json::from_value(salts.clone()).map_err(|e| StoreError::MalformedMetadata {
            path: self.metadata_path().to_string(),
            reason: format!("invalid {SALTS_FIELD}: {e}"),
        })
    }

    /// Load every snapshot listed in `metadata` and replace the cache.
    pub fn load_content(&self, metadata: &Metadata) -> StoreResult<()> {
        let snapshots = self.fetch_snapshots(&self.snapshot_infos(metadata)?)?;
        tracing::debug!(
            scope = %self.scope,
            snapshots = snapshots.len(),
            version = metadata.version().unwrap_or_default(),
            "Loaded salt snapshots"
        );
        let mut cache = self.cache.write().map_err(|_| StoreError::poisoned("salt reader"))?;
        *cache = Loaded {
            snapshots,
            metadata: Some(metadata.clone()),
        };
        Ok(())
    }

    pub fn reload(&self) -> StoreResult<()> {
        match self.get_metadata()? {
            Some(metadata) => self.load_content(&metadata),
            None => {
                let mut cache =
                    self.cache.write().map_err(|_| StoreError::poisoned("salt reader"))?;
                *cache = Loaded::default();
                Ok(())
            }
        }
    }

    /// Snapshots currently in storage, bypassing the cache.
    pub fn read(&self) -> StoreResult<Vec<SaltSnapshot>> {
        match self.get_metadata()? {
            Some(metadata) => self.fetch_snapshots(&self.snapshot_infos(&metadata)?),
            None => Ok(Vec::new()),
        }
    }

    /// Like [`read`](Self::read), but skips snapshots that are expired or
    /// superseded at `now` without downloading them.
    pub fn read_live(&self, now: DateTime<Utc>) -> StoreResult<Vec<SaltSnapshot>> {
        match self.get_metadata()? {
            Some(metadata) => {
                let listed = self.snapshot_infos(&metadata)?;
                let total = listed.len();
                let live = live_infos(listed, now);
                tracing::debug!(
                    scope = %self.scope,
                    listed = total,
                    live = live.len(),
                    "Skipping snapshots that can no longer be published"
                );
                self.fetch_snapshots(&live)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Cached snapshots, empty before the first load.
    pub fn snapshots(&self) -> StoreResult<Vec<SaltSnapshot>> {
        let cache = self.cache.read().map_err(|_| StoreError::poisoned("salt reader"))?;
        Ok(cache.snapshots.clone())
    }

    pub fn cached_metadata(&self) -> StoreResult<Option<Metadata>> {
        let cache = self.cache.read().map_err(|_| StoreError::poisoned("salt reader"))?;
        Ok(cache.metadata.clone())
    }

    fn fetch_snapshots(&self, infos: &[SnapshotInfo]) -> StoreResult<Vec<SaltSnapshot>> {
        infos
            .iter()
            .map(|info| {
                let bytes = self.files.download(&info.location)?;
                let content = match &self.keys {
                    Some(keys) => decrypt_envelope(&bytes, keys.as_ref())?,
                    None => String::from_utf8(bytes).map_err(|e| {
                        StoreError::MalformedContent(format!(
                            "salt snapshot {} is not UTF-8: {e}",
                            info.location
                        ))
                    })?,
                };
                Ok(SaltSnapshot::new(
                    info.effective_at()?,
                    info.expires_at()?,
                    csv::from_csv(&content)?,
                ))
            })
            .collect()
    }
}

impl StoreListener for SaltStoreReader {
    fn on_write(&self, event: &WriteEvent) -> StoreResult<()> {
        if event.metadata_path != self.metadata_path() {
            return Ok(());
        }
        self.reload()
    }
}

impl MetadataSource for SaltStoreReader {
    fn current_metadata(&self) -> StoreResult<Option<Metadata>> {
        self.get_metadata()
    }
}
