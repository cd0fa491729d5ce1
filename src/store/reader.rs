// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cached reader for one entity type in one scope.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::entities::EntityCodec;
use super::file_manager::FileManager;
use super::metadata::Metadata;
use super::scope::StoreScope;
use super::version::MetadataSource;
use super::writer::{decrypt_envelope, EncryptionKeyProvider, StoreListener, WriteEvent};
use crate::error::{StoreError, StoreResult};
use crate::models::CloudEncryptionKey;
use crate::storage::CloudPath;

struct Loaded<T> {
    collection: T,
    metadata: Metadata,
}

/// Reads metadata and content for a codec and caches the last load.
///
/// Subscribed to a writer as a [`StoreListener`], it reloads after every
/// write to its own metadata path.
pub struct StoreReader<C: EntityCodec> {
    files: FileManager,
    scope: StoreScope,
    keys: Option<Arc<dyn EncryptionKeyProvider>>,
    cache: RwLock<Option<Loaded<C::Collection>>>,
}

impl<C: EntityCodec> StoreReader<C> {
    pub fn new(files: FileManager, scope: StoreScope) -> Self {
        Self {
            files,
            scope,
            keys: None,
            cache: RwLock::new(None),
        }
    }

    /// Reader for enveloped content, decrypted with `keys`.
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

    /// Fetch the stored metadata. `None` when nothing has been written.
    pub fn get_metadata(&self) -> StoreResult<Option<Metadata>> {
        match self.files.download_metadata(&self.metadata_path()) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load the content `metadata` points at and replace the cached view.
    pub fn load_content(&self, metadata: &Metadata) -> StoreResult<()> {
        let collection = self.fetch_content(metadata)?;
        let mut cache = self.cache.write().map_err(|_| StoreError::poisoned("store reader"))?;
        *cache = Some(Loaded {
            collection,
            metadata: metadata.clone(),
        });
        tracing::debug!(
            data_type = C::DATA_TYPE,
            scope = %self.scope,
            version = metadata.version().unwrap_or_default(),
            "Loaded store content"
        );
        Ok(())
    }

    /// Re-read metadata and content. Clears the cache if metadata is gone.
    pub fn reload(&self) -> StoreResult<()> {
        match self.get_metadata()? {
            Some(metadata) => self.load_content(&metadata),
            None => {
                let mut cache =
                    self.cache.write().map_err(|_| StoreError::poisoned("store reader"))?;
                *cache = None;
                Ok(())
            }
        }
    }

    /// Reload only when the stored version is newer than the cached one.
    ///
    /// Returns whether content was reloaded.
    pub fn reload_if_changed(&self) -> StoreResult<bool> {
        let Some(metadata) = self.get_metadata()? else {
            return Ok(false);
        };
        let stored = metadata.version().ok_or_else(|| StoreError::MalformedMetadata {
            path: self.metadata_path().to_string(),
            reason: "missing version".to_string(),
        })?;
        if let Some(cached) = self.cached_version()? {
            if stored <= cached {
                return Ok(false);
            }
        }
        self.load_content(&metadata)?;
        Ok(true)
    }

    /// Read straight from storage without touching the cache.
    ///
    /// Returns an empty collection and empty metadata when nothing has been
    /// written yet.
    pub fn read(&self) -> StoreResult<(C::Collection, Metadata)> {
        match self.get_metadata()? {
            Some(metadata) => Ok((self.fetch_content(&metadata)?, metadata)),
            None => Ok((C::Collection::default(), Metadata::new())),
        }
    }

    /// Cached collection, empty before the first load.
    pub fn get_all(&self) -> StoreResult<C::Collection> {
        let cache = self.cache.read().map_err(|_| StoreError::poisoned("store reader"))?;
        Ok(cache
            .as_ref()
            .map(|loaded| loaded.collection.clone())
            .unwrap_or_default())
    }

    pub fn cached_metadata(&self) -> StoreResult<Option<Metadata>> {
        let cache = self.cache.read().map_err(|_| StoreError::poisoned("store reader"))?;
        Ok(cache.as_ref().map(|loaded| loaded.metadata.clone()))
    }

    pub fn cached_version(&self) -> StoreResult<Option<i64>> {
        Ok(self.cached_metadata()?.and_then(|metadata| metadata.version()))
    }

    fn fetch_content(&self, metadata: &Metadata) -> StoreResult<C::Collection> {
        let location = metadata.require_location(C::DATA_TYPE, &self.metadata_path())?;
        let bytes = self.files.download(&location)?;
        match &self.keys {
            Some(keys) => {
                let plaintext = decrypt_envelope(&bytes, keys.as_ref())?;
                C::deserialize(plaintext.as_bytes())
            }
            None => C::deserialize(&bytes),
        }
    }
}

impl<C: EntityCodec> StoreListener for StoreReader<C> {
    fn on_write(&self, event: &WriteEvent) -> StoreResult<()> {
        if event.metadata_path != self.metadata_path() {
            return Ok(());
        }
        self.reload()
    }
}

impl<C: EntityCodec> MetadataSource for StoreReader<C> {
    fn current_metadata(&self) -> StoreResult<Option<Metadata>> {
        self.get_metadata()
    }
}

impl<C> EncryptionKeyProvider for StoreReader<C>
where
    C: EntityCodec<Collection = BTreeMap<i32, CloudEncryptionKey>>,
{
    fn encryption_keys(&self) -> StoreResult<Vec<CloudEncryptionKey>> {
        Ok(self.get_all()?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EncryptionKeyAcl;
    use crate::store::entities::{CloudEncryptionKeys, KeyAcls};
    use crate::store::writer::scoped::tests::memory_files;
    use std::collections::BTreeSet;
    use std::thread;

    const METADATA: &str = "keys_acl/metadata.json";

    fn seed(storage: &crate::storage::MemoryObjectStorage, version: i64, acl_site: i32) {
        storage
            .put(
                METADATA,
                format!(
                    r#"{{"version": {version}, "keys_acl": {{"location": "keys_acl/keys_acl.json"}}}}"#
                ),
            )
            .unwrap();
        storage
            .put(
                "keys_acl/keys_acl.json",
                format!(r#"[{{"site_id": {acl_site}, "blacklist": []}}]"#),
            )
            .unwrap();
    }

    #[test]
    fn missing_metadata_reads_empty() {
        let (_storage, files) = memory_files();
        let reader = StoreReader::<KeyAcls>::new(files, StoreScope::global(METADATA));

        assert!(reader.get_metadata().unwrap().is_none());
        let (collection, metadata) = reader.read().unwrap();
        assert!(collection.is_empty());
        assert_eq!(metadata, Metadata::new());
        reader.reload().unwrap();
        assert!(reader.get_all().unwrap().is_empty());
    }

    #[test]
    fn load_content_fills_cache() {
        let (storage, files) = memory_files();
        seed(&storage, 3, 5);
        let reader = StoreReader::<KeyAcls>::new(files, StoreScope::global(METADATA));

        let metadata = reader.get_metadata().unwrap().unwrap();
        reader.load_content(&metadata).unwrap();

        let acls = reader.get_all().unwrap();
        assert_eq!(
            acls.get(&5),
            Some(&EncryptionKeyAcl {
                site_id: 5,
                is_whitelist: false,
                accessors: BTreeSet::new(),
            })
        );
        assert_eq!(reader.cached_version().unwrap(), Some(3));
    }

    #[test]
    fn reload_if_changed_requires_newer_version() {
        let (storage, files) = memory_files();
        seed(&storage, 3, 5);
        let reader = StoreReader::<KeyAcls>::new(files, StoreScope::global(METADATA));

        assert!(reader.reload_if_changed().unwrap());
        assert!(!reader.reload_if_changed().unwrap());

        // same version, different content: treated as unchanged
        seed(&storage, 3, 6);
        assert!(!reader.reload_if_changed().unwrap());
        assert!(reader.get_all().unwrap().contains_key(&5));

        seed(&storage, 4, 6);
        assert!(reader.reload_if_changed().unwrap());
        assert!(reader.get_all().unwrap().contains_key(&6));
    }

    #[test]
    fn poisoned_cache_is_an_error() {
        let (_storage, files) = memory_files();
        let reader = StoreReader::<CloudEncryptionKeys>::new(
            files,
            StoreScope::global("cloud_encryption_keys/metadata.json"),
        );
        thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = reader.cache.write().unwrap();
                    panic!("writer died holding the cache");
                })
                .join();
        });

        assert!(matches!(reader.get_all(), Err(StoreError::IllegalState(_))));
        assert!(matches!(reader.cached_metadata(), Err(StoreError::IllegalState(_))));
        let err = reader.encryption_keys().unwrap_err();
        assert!(err.to_string().contains("lock poisoned"));
    }

    #[test]
    fn ignores_events_for_other_paths() {
        let (storage, files) = memory_files();
        seed(&storage, 3, 5);
        let reader = StoreReader::<KeyAcls>::new(files, StoreScope::global(METADATA));

        reader
            .on_write(&WriteEvent {
                data_type: "keys_acl".to_string(),
                metadata_path: CloudPath::new("keys_acl/site/5/metadata.json"),
                version: 3,
            })
            .unwrap();
        assert!(reader.cached_metadata().unwrap().is_none());

        reader
            .on_write(&WriteEvent {
                data_type: "keys_acl".to_string(),
                metadata_path: CloudPath::new(METADATA),
                version: 3,
            })
            .unwrap();
        assert_eq!(reader.cached_version().unwrap(), Some(3));
    }

    #[test]
    fn cloud_key_reader_provides_keys() {
        let (storage, files) = memory_files();
        storage
            .put(
                "cloud_encryption_keys/metadata.json",
                r#"{"version": 1, "cloud_encryption_keys": {"location": "cloud_encryption_keys/cloud_encryption_keys.json"}}"#,
            )
            .unwrap();
        storage
            .put(
                "cloud_encryption_keys/cloud_encryption_keys.json",
                r#"[
                    {"id": 1, "site_id": 5, "activates": 0, "created": 0, "secret": "a"},
                    {"id": 4, "site_id": 5, "activates": 0, "created": 0, "secret": "b"}
                ]"#,
            )
            .unwrap();
        let reader = StoreReader::<CloudEncryptionKeys>::new(
            files,
            StoreScope::global("cloud_encryption_keys/metadata.json"),
        );
        reader.reload().unwrap();

        assert_eq!(reader.key_for_site(5).unwrap().id, 4);
        assert_eq!(reader.key_by_id(1).unwrap().secret, "a");
    }
}
