// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Versioned writer for one data type in one scope.

use std::sync::Arc;

use super::{DocumentWriter, Listeners, StoreListener, WriteEvent};
use crate::error::StoreResult;
use crate::storage::FileName;
use crate::store::clock::Clock;
use crate::store::file_manager::FileManager;
use crate::store::metadata::{AdditionalFields, Metadata};
use crate::store::scope::StoreScope;
use crate::store::version::VersionGenerator;

/// Writes content and metadata for a `(data type, scope)` pair.
///
/// The content location is fixed by the first write and read back from the
/// metadata on every later write, so content never moves.
pub struct ScopedStoreWriter {
    files: FileManager,
    versions: Arc<dyn VersionGenerator>,
    clock: Arc<dyn Clock>,
    scope: StoreScope,
    data_file: FileName,
    data_type: String,
    backup_file: Option<FileName>,
    listeners: Listeners,
}

impl ScopedStoreWriter {
    pub fn new(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        scope: StoreScope,
        data_file: FileName,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            files,
            versions,
            clock,
            scope,
            data_file,
            data_type: data_type.into(),
            backup_file: None,
            listeners: Listeners::default(),
        }
    }

    /// Back up the previous content before each overwrite.
    pub fn with_backup(mut self, backup_file: FileName) -> Self {
        self.backup_file = Some(backup_file);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StoreListener>) -> Self {
        self.subscribe(listener);
        self
    }

    pub fn subscribe(&mut self, listener: Arc<dyn StoreListener>) {
        self.listeners.push(listener);
    }

    pub fn data_file(&self) -> &FileName {
        &self.data_file
    }

    fn notify(&self, metadata: &Metadata) -> StoreResult<()> {
        self.listeners.notify(&WriteEvent {
            data_type: self.data_type.clone(),
            metadata_path: self.scope.metadata_path(),
            version: metadata.version().unwrap_or_default(),
        })
    }
}

impl DocumentWriter for ScopedStoreWriter {
    fn upload(&self, content: &str, extra: Option<&AdditionalFields>) -> StoreResult<Metadata> {
        let metadata_path = self.scope.metadata_path();
        let first_write = !self.files.is_present(&metadata_path)?;

        let (mut metadata, location) = if first_write {
            let location = self.scope.resolve(&self.data_file.to_string());
            let mut metadata = Metadata::new();
            metadata.set_location(&self.data_type, &location);
            (metadata, location)
        } else {
            let metadata = self.files.download_metadata(&metadata_path)?;
            let location = metadata.require_location(&self.data_type, &metadata_path)?;
            (metadata, location)
        };

        metadata.advance_version(self.versions.next_version()?);
        let generated = self.clock.epoch_seconds();
        metadata.set_generated(generated);
        if let Some(extra) = extra {
            metadata.merge_extra(extra);
        }

        if let (false, Some(backup_file)) = (first_write, &self.backup_file) {
            self.files.backup_file(&location, backup_file, generated)?;
        }

        self.files
            .upload_file(&location, &self.data_file, content.as_bytes())?;
        self.files
            .upload_metadata(&metadata, &self.data_type, &metadata_path)?;

        tracing::info!(
            data_type = %self.data_type,
            scope = %self.scope,
            location = %location,
            version = metadata.version().unwrap_or_default(),
            first_write,
            "Uploaded store content"
        );

        self.notify(&metadata)?;
        Ok(metadata)
    }

    fn rewrite_meta(&self) -> StoreResult<()> {
        let metadata_path = self.scope.metadata_path();
        if !self.files.is_present(&metadata_path)? {
            tracing::debug!(
                data_type = %self.data_type,
                scope = %self.scope,
                "No metadata to rewrite"
            );
            return Ok(());
        }

        let mut metadata = self.files.download_metadata(&metadata_path)?;
        metadata.advance_version(self.versions.next_version()?);
        self.files
            .upload_metadata(&metadata, &self.data_type, &metadata_path)?;

        tracing::info!(
            data_type = %self.data_type,
            scope = %self.scope,
            version = metadata.version().unwrap_or_default(),
            "Rewrote store metadata"
        );

        self.notify(&metadata)
    }

    fn data_type(&self) -> &str {
        &self.data_type
    }

    fn scope(&self) -> &StoreScope {
        &self.scope
    }
}
