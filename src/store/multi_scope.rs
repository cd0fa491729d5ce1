// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Fan-out Writer
//!
//! Applies the scoped write protocol to many sites at once. Current state is
//! read per site, compared with the desired state, and only sites that are
//! new or different are written.
//!
//! Any failure aborts the batch; sites written before the failure stay
//! written. Callers retry the whole call.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::clock::Clock;
use super::entities::EntityCodec;
use super::file_manager::FileManager;
use super::metadata::AdditionalFields;
use super::reader::StoreReader;
use super::scope::StoreScope;
use super::version::VersionGenerator;
use super::writer::{EncryptingWriter, EncryptionKeyProvider, EntityStoreWriter, ScopedStoreWriter};
use crate::error::{StoreError, StoreResult};
use crate::storage::CloudPath;

/// Size-then-membership comparison. Order does not matter.
pub fn are_collections_equal<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|item| b.contains(item))
}

/// Size-then-entry comparison.
pub fn are_maps_equal<K: Ord, V: PartialEq>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> bool {
    a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
}

/// Builds per-site readers and writers for one entity type.
pub trait StoreFactory<C: EntityCodec>: Send + Sync {
    fn reader(&self, site_id: i32) -> StoreReader<C>;

    fn writer(&self, site_id: i32) -> EntityStoreWriter<C>;

    /// Writer for the encrypted copy of a site's data, when supported.
    fn encrypted_writer(&self, _site_id: i32, _public: bool) -> Option<EntityStoreWriter<C>> {
        None
    }

    fn supports_encryption(&self) -> bool {
        false
    }
}

/// Factory for data laid out under a root metadata path with
/// `site/<id>` and `encrypted/<id>_<visibility>` subdirectories.
pub struct SiteStoreFactory<C: EntityCodec> {
    files: FileManager,
    versions: Arc<dyn VersionGenerator>,
    clock: Arc<dyn Clock>,
    root_metadata_path: CloudPath,
    keys: Option<Arc<dyn EncryptionKeyProvider>>,
    global_reader: Arc<StoreReader<C>>,
}

impl<C: EntityCodec> SiteStoreFactory<C> {
    pub fn new(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        root_metadata_path: CloudPath,
    ) -> Self {
        let global_reader = Arc::new(StoreReader::new(
            files.clone(),
            StoreScope::global(root_metadata_path.clone()),
        ));
        Self {
            files,
            versions,
            clock,
            root_metadata_path,
            keys: None,
            global_reader,
        }
    }

    /// Also produce encrypted writers using `keys`.
    pub fn with_encryption(mut self, keys: Arc<dyn EncryptionKeyProvider>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn global_reader(&self) -> &Arc<StoreReader<C>> {
        &self.global_reader
    }

    /// Writer for the global scope, reloading the global reader.
    pub fn global_writer(&self) -> EntityStoreWriter<C> {
        let scope = StoreScope::global(self.root_metadata_path.clone());
        EntityStoreWriter::new(
            self.scoped(scope)
                .with_listener(self.global_reader.clone()),
        )
    }

    fn scoped(&self, scope: StoreScope) -> ScopedStoreWriter {
        ScopedStoreWriter::for_entity::<C>(
            self.files.clone(),
            self.versions.clone(),
            self.clock.clone(),
            scope,
        )
    }
}

impl<C: EntityCodec> StoreFactory<C> for SiteStoreFactory<C> {
    fn reader(&self, site_id: i32) -> StoreReader<C> {
        StoreReader::new(
            self.files.clone(),
            StoreScope::site(self.root_metadata_path.clone(), site_id),
        )
    }

    fn writer(&self, site_id: i32) -> EntityStoreWriter<C> {
        let scope = StoreScope::site(self.root_metadata_path.clone(), site_id);
        EntityStoreWriter::new(self.scoped(scope))
    }

    fn encrypted_writer(&self, site_id: i32, public: bool) -> Option<EntityStoreWriter<C>> {
        let keys = self.keys.clone()?;
        let scope = StoreScope::encrypted(self.root_metadata_path.clone(), site_id, public);
        Some(EntityStoreWriter::new(EncryptingWriter::new(
            self.scoped(scope),
            keys,
        )))
    }

    fn supports_encryption(&self) -> bool {
        self.keys.is_some()
    }
}

/// Writes per-site collections, skipping sites whose content is unchanged.
pub struct MultiScopeStoreWriter<C: EntityCodec> {
    factory: Arc<dyn StoreFactory<C>>,
}

impl<C: EntityCodec> MultiScopeStoreWriter<C> {
    pub fn new(factory: Arc<dyn StoreFactory<C>>) -> Self {
        Self { factory }
    }

    /// Write every site whose desired collection differs from what is stored.
    ///
    /// Changed and new sites are written through the plain writer and, when
    /// the factory provides one, the private encrypted writer. Returns the
    /// ids of the sites written.
    pub fn upload_if_changed(
        &self,
        desired: &BTreeMap<i32, C::Collection>,
        extra: Option<&AdditionalFields>,
    ) -> StoreResult<Vec<i32>> {
        let current = self.current_state(desired.keys().copied())?;
        let mut written = Vec::new();

        for (&site_id, collection) in desired {
            let changed = match current.get(&site_id) {
                Some(stored) => !C::same_content(collection, stored),
                None => true,
            };
            if !changed {
                tracing::debug!(site_id, data_type = C::DATA_TYPE, "Site unchanged, skipping");
                continue;
            }

            self.factory.writer(site_id).upload(collection, extra)?;
            if let Some(encrypted) = self.factory.encrypted_writer(site_id, false) {
                encrypted.upload(collection, extra)?;
            }
            written.push(site_id);
        }

        tracing::info!(
            data_type = C::DATA_TYPE,
            sites = desired.len(),
            written = written.len(),
            "Multi-scope upload finished"
        );
        Ok(written)
    }

    /// Write every site's private encrypted copy regardless of changes.
    pub fn upload_encrypted(
        &self,
        desired: &BTreeMap<i32, C::Collection>,
        extra: Option<&AdditionalFields>,
    ) -> StoreResult<()> {
        self.upload_all_encrypted(desired, extra, false)
    }

    /// Write every site's public encrypted copy regardless of changes.
    pub fn upload_public_encrypted(
        &self,
        desired: &BTreeMap<i32, C::Collection>,
        extra: Option<&AdditionalFields>,
    ) -> StoreResult<()> {
        self.upload_all_encrypted(desired, extra, true)
    }

    /// Encrypted copies when the factory supports them, changed plain
    /// copies otherwise.
    pub fn upload_with_encryption_or_changes(
        &self,
        desired: &BTreeMap<i32, C::Collection>,
        extra: Option<&AdditionalFields>,
    ) -> StoreResult<()> {
        if self.factory.supports_encryption() {
            self.upload_encrypted(desired, extra)
        } else {
            self.upload_if_changed(desired, extra).map(|_| ())
        }
    }

    fn upload_all_encrypted(
        &self,
        desired: &BTreeMap<i32, C::Collection>,
        extra: Option<&AdditionalFields>,
        public: bool,
    ) -> StoreResult<()> {
        for (&site_id, collection) in desired {
            let writer = self.factory.encrypted_writer(site_id, public).ok_or_else(|| {
                StoreError::IllegalState(format!(
                    "{} store does not support encryption",
                    C::DATA_TYPE
                ))
            })?;
            writer.upload(collection, extra)?;
        }
        Ok(())
    }

    fn current_state(
        &self,
        site_ids: impl Iterator<Item = i32>,
    ) -> StoreResult<BTreeMap<i32, C::Collection>> {
        let mut state = BTreeMap::new();
        for site_id in site_ids {
            let reader = self.factory.reader(site_id);
            if let Some(metadata) = reader.get_metadata()? {
                reader.load_content(&metadata)?;
                state.insert(site_id, reader.get_all()?);
            }
        }
        Ok(state)
    }
}
