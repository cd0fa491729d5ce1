// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Writer for global-only data types whose metadata is provisioned
//! out of band (operators, admins, enclaves, partners).

use std::sync::Arc;

use super::{DocumentWriter, Listeners, StoreListener, WriteEvent};
use crate::error::{StoreError, StoreResult};
use crate::storage::{CloudPath, FileName};
use crate::store::clock::Clock;
use crate::store::file_manager::FileManager;
use crate::store::metadata::{AdditionalFields, Metadata};
use crate::store::scope::StoreScope;
use crate::store::version::VersionGenerator;

/// Overwrites content at the location recorded in existing metadata.
///
/// Never bootstraps: a missing metadata document is an error.
pub struct LegacyStoreWriter {
    files: FileManager,
    versions: Arc<dyn VersionGenerator>,
    clock: Arc<dyn Clock>,
    scope: StoreScope,
    data_file: FileName,
    data_type: String,
    backup_file: Option<FileName>,
    listeners: Listeners,
}

impl LegacyStoreWriter {
    pub fn new(
        files: FileManager,
        versions: Arc<dyn VersionGenerator>,
        clock: Arc<dyn Clock>,
        metadata_path: CloudPath,
        data_file: FileName,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            files,
            versions,
            clock,
            scope: StoreScope::global(metadata_path),
            data_file,
            data_type: data_type.into(),
            backup_file: None,
            listeners: Listeners::default(),
        }
    }

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

    fn existing_metadata(&self, metadata_path: &CloudPath) -> StoreResult<Metadata> {
        match self.files.download_metadata(metadata_path) {
            Ok(metadata) => Ok(metadata),
            Err(e) if e.is_not_found() => Err(StoreError::IllegalState(format!(
                "{} metadata does not exist at {metadata_path}",
                self.data_type
            ))),
            Err(e) => Err(e),
        }
    }

    fn notify(&self, metadata_path: CloudPath, metadata: &Metadata) -> StoreResult<()> {
        self.listeners.notify(&WriteEvent {
            data_type: self.data_type.clone(),
            metadata_path,
            version: metadata.version().unwrap_or_default(),
        })
    }
}

impl DocumentWriter for LegacyStoreWriter {
    fn upload(&self, content: &str, extra: Option<&AdditionalFields>) -> StoreResult<Metadata> {
        let metadata_path = self.scope.metadata_path();
        let mut metadata = self.existing_metadata(&metadata_path)?;
        let location = metadata.require_location(&self.data_type, &metadata_path)?;

        metadata.advance_version(self.versions.next_version()?);
        let generated = self.clock.epoch_seconds();
        metadata.set_generated(generated);
        if let Some(extra) = extra {
            metadata.merge_extra(extra);
        }

        if let Some(backup_file) = &self.backup_file {
            self.files.backup_file(&location, backup_file, generated)?;
        }

        self.files
            .upload_file(&location, &self.data_file, content.as_bytes())?;
        self.files
            .upload_metadata(&metadata, &self.data_type, &metadata_path)?;

        tracing::info!(
            data_type = %self.data_type,
            location = %location,
            version = metadata.version().unwrap_or_default(),
            "Uploaded legacy store content"
        );

        self.notify(metadata_path, &metadata)?;
        Ok(metadata)
    }

    fn rewrite_meta(&self) -> StoreResult<()> {
        let metadata_path = self.scope.metadata_path();
        if !self.files.is_present(&metadata_path)? {
            tracing::debug!(data_type = %self.data_type, "No legacy metadata to rewrite");
            return Ok(());
        }
        let mut metadata = self.files.download_metadata(&metadata_path)?;
        metadata.advance_version(self.versions.next_version()?);
        self.files
            .upload_metadata(&metadata, &self.data_type, &metadata_path)?;

        tracing::info!(
            data_type = %self.data_type,
            version = metadata.version().unwrap_or_default(),
            "Rewrote legacy store metadata"
        );

        self.notify(metadata_path, &metadata)
    }

    fn data_type(&self) -> &str {
        &self.data_type
    }

    fn scope(&self) -> &StoreScope {
        &self.scope
    }
}
