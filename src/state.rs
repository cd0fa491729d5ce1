// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared wiring from [`StoreConfig`] to concrete stores.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::storage::{FileStorage, LocalFsObjectStorage, ObjectStorage, TmpFileStorage};
use crate::store::entities::CloudEncryptionKeys;
use crate::store::salt::SALTS_DATA_TYPE;
use crate::store::{
    Clock, EncryptionKeyProvider, EntityCodec, EntityStore, EpochVersionGenerator, FileManager,
    SaltStoreReader, SaltStoreWriter, SiteStoreFactory, SnapshotLayout, StoreReader, StoreScope,
    SystemClock, VersionGenerator,
};

/// Storage, clock and version source shared by every store.
#[derive(Clone)]
pub struct StoreState {
    pub config: StoreConfig,
    pub files: FileManager,
    pub clock: Arc<dyn Clock>,
    pub versions: Arc<dyn VersionGenerator>,
}

impl StoreState {
    pub fn new(
        config: StoreConfig,
        storage: Arc<dyn ObjectStorage>,
        staging: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            files: FileManager::new(storage, staging),
            versions: Arc::new(EpochVersionGenerator::new(clock.clone())),
            clock,
        }
    }

    /// Filesystem-backed state rooted at `config.storage_root`, on the
    /// system clock.
    pub fn from_config(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let storage = Arc::new(LocalFsObjectStorage::new(&config.storage_root));
        tracing::info!(root = %config.storage_root.display(), "Using filesystem object storage");
        Ok(Self::new(
            config,
            storage,
            Arc::new(TmpFileStorage::default()),
            Arc::new(SystemClock),
        ))
    }

    /// Replace the version source.
    pub fn with_versions(mut self, versions: Arc<dyn VersionGenerator>) -> Self {
        self.versions = versions;
        self
    }

    /// Global store for `C`, using the legacy writer for legacy types.
    pub fn global_store<C: EntityCodec>(&self) -> EntityStore<C> {
        let metadata_path = self.config.metadata_path(C::DATA_TYPE);
        if C::LEGACY {
            EntityStore::legacy(
                self.files.clone(),
                self.versions.clone(),
                self.clock.clone(),
                metadata_path,
            )
        } else {
            EntityStore::new(
                self.files.clone(),
                self.versions.clone(),
                self.clock.clone(),
                StoreScope::global(metadata_path),
            )
        }
    }

    pub fn site_store<C: EntityCodec>(&self, site_id: i32) -> EntityStore<C> {
        EntityStore::new(
            self.files.clone(),
            self.versions.clone(),
            self.clock.clone(),
            StoreScope::site(self.config.metadata_path(C::DATA_TYPE), site_id),
        )
    }

    pub fn encrypted_store<C: EntityCodec>(
        &self,
        site_id: i32,
        public: bool,
        keys: Arc<dyn EncryptionKeyProvider>,
    ) -> EntityStore<C> {
        EntityStore::encrypted(
            self.files.clone(),
            self.versions.clone(),
            self.clock.clone(),
            StoreScope::encrypted(self.config.metadata_path(C::DATA_TYPE), site_id, public),
            keys,
        )
    }

    /// Per-site factory for the fan-out writer.
    pub fn site_factory<C: EntityCodec>(&self) -> SiteStoreFactory<C> {
        SiteStoreFactory::new(
            self.files.clone(),
            self.versions.clone(),
            self.clock.clone(),
            self.config.metadata_path(C::DATA_TYPE),
        )
    }

    /// Loaded reader of the global cloud encryption keys.
    pub fn cloud_encryption_keys(&self) -> StoreResult<Arc<StoreReader<CloudEncryptionKeys>>> {
        let reader = StoreReader::new(
            self.files.clone(),
            StoreScope::global(self.config.metadata_path(CloudEncryptionKeys::DATA_TYPE)),
        );
        reader.reload()?;
        Ok(Arc::new(reader))
    }

    /// Writer for the global plain salt snapshots.
    pub fn salt_writer(&self) -> SaltStoreWriter {
        let scope = StoreScope::global(self.config.metadata_path(SALTS_DATA_TYPE));
        SaltStoreWriter::new(
            self.files.clone(),
            self.versions.clone(),
            self.clock.clone(),
            Arc::new(SaltStoreReader::new(self.files.clone(), scope)),
            SnapshotLayout::PlainSnapshots {
                prefix: self.config.salt_snapshot_location_prefix.clone(),
            },
        )
    }

    /// Writer for one site's encrypted salt snapshots.
    pub fn encrypted_salt_writer(
        &self,
        site_id: i32,
        public: bool,
        keys: Arc<dyn EncryptionKeyProvider>,
    ) -> SaltStoreWriter {
        let scope =
            StoreScope::encrypted(self.config.metadata_path(SALTS_DATA_TYPE), site_id, public);
        SaltStoreWriter::new(
            self.files.clone(),
            self.versions.clone(),
            self.clock.clone(),
            Arc::new(SaltStoreReader::with_decryption(
                self.files.clone(),
                scope,
                keys.clone(),
            )),
            SnapshotLayout::EncryptedSnapshots { site_id, keys },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CloudEncryptionKey, Site};
    use crate::storage::MemoryObjectStorage;
    use crate::store::entities::{OperatorKeys, Sites};
    use crate::store::ManualClock;
    use crate::StoreError;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

    fn memory_state(config: StoreConfig) -> (MemoryObjectStorage, StoreState) {
        let storage = MemoryObjectStorage::new();
        let state = StoreState::new(
            config,
            Arc::new(storage.clone()),
            Arc::new(storage.clone()),
            Arc::new(ManualClock::at_seconds(1)),
        );
        (storage, state)
    }

    fn site(id: i32) -> Site {
        Site {
            id,
            name: format!("site-{id}"),
            enabled: true,
            types: BTreeSet::new(),
            domain_names: BTreeSet::new(),
            app_names: BTreeSet::new(),
            visible: true,
            created: 1,
        }
    }

    #[test]
    fn config_overrides_metadata_path() {
        let config = StoreConfig::from_json_str(
            r#"{"metadata_paths": {"sites": "cfg/sites/metadata.json"}}"#,
        )
        .unwrap();
        let (storage, state) = memory_state(config);

        state.global_store::<Sites>().write(&vec![site(1)], None).unwrap();

        assert!(storage.contains("cfg/sites/metadata.json"));
        assert!(storage.contains("cfg/sites/sites.json"));
    }

    #[test]
    fn legacy_types_use_legacy_writer() {
        let (_storage, state) = memory_state(StoreConfig::default());
        let err = state
            .global_store::<OperatorKeys>()
            .write(&vec![], None)
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalState(_)));
    }

    #[test]
    fn site_store_is_scoped() {
        let (storage, state) = memory_state(StoreConfig::default());
        state.site_store::<Sites>(5).write(&vec![site(5)], None).unwrap();
        assert!(storage.contains("sites/site/5/sites.json"));
        assert!(!storage.contains("sites/metadata.json"));
    }

    #[test]
    fn cloud_keys_drive_encrypted_store() {
        let (_storage, state) = memory_state(StoreConfig::default());
        let mut keys = BTreeMap::new();
        keys.insert(
            1,
            CloudEncryptionKey {
                id: 1,
                site_id: 5,
                activates: 0,
                created: 0,
                secret: crate::crypto::generate_secret(),
            },
        );
        state
            .global_store::<CloudEncryptionKeys>()
            .write(&keys, None)
            .unwrap();

        let provider = state.cloud_encryption_keys().unwrap();
        let store = state.encrypted_store::<Sites>(5, false, provider);
        store.write(&vec![site(5)], None).unwrap();

        assert_eq!(store.cached().unwrap(), vec![site(5)]);
    }

    #[test]
    fn from_config_uses_filesystem_root() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig {
            storage_root: dir.path().to_path_buf(),
            ..StoreConfig::default()
        };
        let state = StoreState::from_config(config).unwrap();

        state.global_store::<Sites>().write(&vec![site(2)], None).unwrap();

        assert!(dir.path().join("sites").join("sites.json").exists());
        assert!(dir.path().join("sites").join("metadata.json").exists());
    }
}
