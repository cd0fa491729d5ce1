// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed writer and reader/writer pair for entity collections.

use std::marker::PhantomData;
use std::sync::Arc;

use super::{
    DocumentWriter, EncryptingWriter, EncryptionKeyProvider, LegacyStoreWriter, ScopedStoreWriter,
};
use crate::error::StoreResult;
use crate::storage::CloudPath;
use crate::store::clock::Clock;
use crate::store::entities::{EncryptionKeys, EntityCodec};
use crate::store::file_manager::FileManager;
use crate::store::metadata::{AdditionalFields, Metadata};
use crate::store::reader::StoreReader;
use crate::store::scope::StoreScope;
use crate::store::version::VersionGenerator;
use crate::models::EncryptionKey;

impl ScopedStoreWriter {
    /// Scoped writer configured with a codec's file, data type and backup.
    pub fn for_entity<C: EntityCodec>(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        scope: StoreScope,
    ) -> Self {
        let writer = ScopedStoreWriter::new(
            files,
            versions,
            clock,
            scope,
            C::data_file(),
            C::DATA_TYPE,
        );
        match C::backup_file() {
            Some(backup) => writer.with_backup(backup),
            None => writer,
        }
    }
}

impl LegacyStoreWriter {
    /// Legacy writer configured with a codec's file, data type and backup.
    pub fn for_entity<C: EntityCodec>(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        metadata_path: CloudPath,
    ) -> Self {
        let writer = LegacyStoreWriter::new(
            files,
            versions,
            clock,
            metadata_path,
            C::data_file(),
            C::DATA_TYPE,
        );
        match C::backup_file() {
            Some(backup) => writer.with_backup(backup),
            None => writer,
        }
    }
}

/// Serializes a collection with its codec and hands it to a document writer.
pub struct EntityStoreWriter<C: EntityCodec> {
    writer: Box<dyn DocumentWriter>,
    codec: PhantomData<fn() -> C>,
}

impl<C: EntityCodec> EntityStoreWriter<C> {
    pub fn new(writer: impl DocumentWriter + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            codec: PhantomData,
        }
    }

    /// Write the whole collection, replacing the stored snapshot.
    pub fn upload(
        &self,
        collection: &C::Collection,
        extra: Option<&AdditionalFields>,
    ) -> StoreResult<Metadata> {
        let content = C::serialize(collection)?;
        self.writer.upload(&content, extra)
    }

    pub fn rewrite_meta(&self) -> StoreResult<()> {
        self.writer.rewrite_meta()
    }

    pub fn document_writer(&self) -> &dyn DocumentWriter {
        self.writer.as_ref()
    }
}

impl EntityStoreWriter<EncryptionKeys> {
    /// Write keys and record the highest allocated key id.
    pub fn upload_with_max_key_id(
        &self,
        keys: &[EncryptionKey],
        max_key_id: i32,
    ) -> StoreResult<Metadata> {
        self.upload(&keys.to_vec(), Some(&AdditionalFields::with_max_key_id(max_key_id)))
    }
}

/// A reader and a writer for the same data type and scope.
///
/// The reader is subscribed to the writer, so [`EntityStore::cached`]
/// reflects every completed write.
pub struct EntityStore<C: EntityCodec> {
    reader: Arc<StoreReader<C>>,
    writer: EntityStoreWriter<C>,
}

impl<C: EntityCodec> EntityStore<C> {
    /// Plaintext store in `scope`.
    pub fn new(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        scope: StoreScope,
    ) -> Self {
        let reader = Arc::new(StoreReader::new(files.clone(), scope.clone()));
        let writer = ScopedStoreWriter::for_entity::<C>(files, versions, clock, scope)
            .with_listener(reader.clone());
        Self {
            reader,
            writer: EntityStoreWriter::new(writer),
        }
    }

    /// Global store whose metadata must already exist.
    pub fn legacy(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        metadata_path: CloudPath,
    ) -> Self {
        let reader = Arc::new(StoreReader::new(
            files.clone(),
            StoreScope::global(metadata_path.clone()),
        ));
        let writer = LegacyStoreWriter::for_entity::<C>(files, versions, clock, metadata_path)
            .with_listener(reader.clone());
        Self {
            reader,
            writer: EntityStoreWriter::new(writer),
        }
    }

    /// Store whose content is envelope-encrypted for the scope's site.
    pub fn encrypted(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        scope: StoreScope,
        keys: Arc<dyn EncryptionKeyProvider>,
    ) -> Self {
        let reader = Arc::new(StoreReader::with_decryption(
            files.clone(),
            scope.clone(),
            keys.clone(),
        ));
        let scoped = ScopedStoreWriter::for_entity::<C>(files, versions, clock, scope)
            .with_listener(reader.clone());
        Self {
            reader,
            writer: EntityStoreWriter::new(EncryptingWriter::new(scoped, keys)),
        }
    }

    /// Current stored collection and metadata, read from storage.
    pub fn read(&self) -> StoreResult<(C::Collection, Metadata)> {
        self.reader.read()
    }

    /// Write a full snapshot and return the stored metadata.
    pub fn write(
        &self,
        collection: &C::Collection,
        extra: Option<&AdditionalFields>,
    ) -> StoreResult<Metadata> {
        self.writer.upload(collection, extra)
    }

    pub fn rewrite_meta(&self) -> StoreResult<()> {
        self.writer.rewrite_meta()
    }

    /// Collection as of the last completed write or reload.
    pub fn cached(&self) -> StoreResult<C::Collection> {
        self.reader.get_all()
    }

    pub fn reader(&self) -> &Arc<StoreReader<C>> {
        &self.reader
    }

    pub fn writer(&self) -> &EntityStoreWriter<C> {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use crate::error::StoreError;
    use crate::models::CloudEncryptionKey;
    use crate::store::clock::ManualClock;
    use crate::store::entities::{Enclaves, Keysets, OperatorKeys};
    use crate::store::version::tests::CountingVersions;
    use crate::store::writer::encrypted::tests::{key, keys};
    use crate::store::writer::scoped::tests::memory_files;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn encryption_key(id: i32) -> EncryptionKey {
        EncryptionKey {
            id,
            site_id: 5,
            created: 1,
            activates: 2,
            expires: 3,
            secret: crypto::generate_secret(),
        }
    }

    fn deps() -> (Arc<dyn VersionGenerator>, Arc<dyn Clock>) {
        (
            Arc::new(CountingVersions::default()),
            Arc::new(ManualClock::at_seconds(1)),
        )
    }

    #[test]
    fn write_then_cached_reflects_write() {
        let (_storage, files) = memory_files();
        let (versions, clock) = deps();
        let store = EntityStore::<EncryptionKeys>::new(
            files,
            versions,
            clock,
            StoreScope::global("keys/metadata.json"),
        );

        let written = vec![encryption_key(1), encryption_key(2)];
        store
            .writer()
            .upload_with_max_key_id(&written, 2)
            .unwrap();

        assert_eq!(store.cached().unwrap(), written);
        let (read, metadata) = store.read().unwrap();
        assert_eq!(read, written);
        assert_eq!(metadata.get("max_key_id"), Some(&json!(2)));
    }

    #[test]
    fn encryption_key_wire_format() {
        let (storage, files) = memory_files();
        let (versions, clock) = deps();
        let scope = StoreScope::global("keys/metadata.json");
        let store = EntityStore::<EncryptionKeys>::new(files, versions, clock, scope);
        let key = encryption_key(7);
        store.write(&vec![key.clone()], None).unwrap();

        let stored: serde_json::Value =
            serde_json::from_str(&storage.get_string("keys/keys.json").unwrap()).unwrap();
        assert_eq!(
            stored,
            json!([{
                "id": 7,
                "site_id": 5,
                "created": 1,
                "activates": 2,
                "expires": 3,
                "secret": key.secret
            }])
        );
    }

    #[test]
    fn map_entity_without_backup() {
        let (storage, files) = memory_files();
        let (versions, clock) = deps();
        let scope = StoreScope::global("keysets/metadata.json");
        let store = EntityStore::<Keysets>::new(files, versions, clock, scope);

        store.write(&BTreeMap::new(), None).unwrap();
        store.write(&BTreeMap::new(), None).unwrap();

        assert!(!storage.contains("keysets/keysets.json.bak"));
        assert_eq!(store.read().unwrap().1.version(), Some(2));
    }

    #[test]
    fn legacy_store_requires_provisioned_metadata() {
        let (storage, files) = memory_files();
        let (versions, clock) = deps();
        let store = EntityStore::<Enclaves>::legacy(
            files,
            versions,
            clock,
            CloudPath::new("enclaves/metadata.json"),
        );

        assert!(matches!(
            store.write(&vec![], None).unwrap_err(),
            StoreError::IllegalState(_)
        ));

        storage
            .put(
                "enclaves/metadata.json",
                r#"{"version": 1, "enclaves": {"location": "enclaves/enclaves.json"}}"#,
            )
            .unwrap();
        store.write(&vec![], None).unwrap();
        assert!(storage.contains("enclaves/enclaves.json"));
        assert!(!storage.contains("enclaves/enclaves.json.bak"));
    }

    #[test]
    fn legacy_operators_back_up() {
        let (storage, files) = memory_files();
        let (versions, clock) = deps();
        storage
            .put(
                "operators/metadata.json",
                r#"{"version": 1, "operators": {"location": "operators/operators.json"}}"#,
            )
            .unwrap();
        storage.put("operators/operators.json", "[]").unwrap();
        let store = EntityStore::<OperatorKeys>::legacy(
            files,
            versions,
            clock,
            CloudPath::new("operators/metadata.json"),
        );

        store.write(&vec![], None).unwrap();

        assert_eq!(
            storage.get_string("operators/operators.json.1.bak").as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn encrypted_store_round_trips_through_envelope() {
        let (storage, files) = memory_files();
        let (versions, clock) = deps();
        let site_key: CloudEncryptionKey = key(3, 5);
        let store = EntityStore::<EncryptionKeys>::encrypted(
            files,
            versions,
            clock,
            StoreScope::encrypted("keys/metadata.json", 5, false),
            keys(vec![site_key]),
        );
        let written = vec![encryption_key(1)];

        store.write(&written, None).unwrap();

        let raw = storage
            .get_string("keys/encrypted/5_private/keys.json")
            .unwrap();
        assert!(raw.contains("\"key_id\": 3"));
        assert_eq!(store.cached().unwrap(), written);
        assert_eq!(store.read().unwrap().0, written);
    }
}
