// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staged uploads, backups and existence checks against object storage.

use std::path::Path;
use std::sync::Arc;

use super::metadata::Metadata;
use crate::error::StoreResult;
use crate::storage::{CloudPath, FileName, FileStorage, ObjectStorage};

/// Writes files to object storage through a local staging area.
#[derive(Clone)]
pub struct FileManager {
    storage: Arc<dyn ObjectStorage>,
    staging: Arc<dyn FileStorage>,
}

impl FileManager {
    pub fn new(storage: Arc<dyn ObjectStorage>, staging: Arc<dyn FileStorage>) -> Self {
        Self { storage, staging }
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Stage `content` locally and upload it to `location`.
    pub fn upload_file(
        &self,
        location: &CloudPath,
        name: &FileName,
        content: &[u8],
    ) -> StoreResult<()> {
        let local = self.staging.create(name, content)?;
        self.upload_staged(&local, &[location.clone()])
    }

    /// Copy the object at `location` to `<location>.bak` and
    /// `<location>.<timestamp>.bak`.
    ///
    /// Fails if there is no object at `location`.
    pub fn backup_file(
        &self,
        location: &CloudPath,
        name: &FileName,
        timestamp: i64,
    ) -> StoreResult<()> {
        let previous = self.storage.download(location)?;
        let local = self.staging.create(name, &previous)?;
        let latest = location.with_suffix(".bak");
        let dated = location.with_suffix(&format!(".{timestamp}.bak"));
        self.upload_staged(&local, &[latest, dated])?;

        tracing::info!(location = %location, timestamp, "Backed up previous content");
        Ok(())
    }

    /// Upload `metadata` as pretty-printed JSON to `metadata_path`.
    pub fn upload_metadata(
        &self,
        metadata: &Metadata,
        data_type: &str,
        metadata_path: &CloudPath,
    ) -> StoreResult<()> {
        let content = metadata.to_pretty_json()?;
        let name = FileName::json(format!("{data_type}-metadata"));
        self.upload_file(metadata_path, &name, content.as_bytes())
    }

    /// True when at least one object key starts with `path`.
    pub fn is_present(&self, path: &CloudPath) -> StoreResult<bool> {
        Ok(!self.storage.list(path)?.is_empty())
    }

    /// True when an object exists at exactly `path`.
    pub fn exists(&self, path: &CloudPath) -> StoreResult<bool> {
        Ok(self
            .storage
            .list(path)?
            .iter()
            .any(|key| key == path.as_str()))
    }

    /// Download the object at `path`.
    pub fn download(&self, path: &CloudPath) -> StoreResult<Vec<u8>> {
        self.storage.download(path)
    }

    /// Download and parse a metadata document.
    pub fn download_metadata(&self, path: &CloudPath) -> StoreResult<Metadata> {
        Metadata::from_slice(&self.storage.download(path)?)
    }

    fn upload_staged(&self, local: &Path, targets: &[CloudPath]) -> StoreResult<()> {
        let result = targets
            .iter()
            .try_for_each(|target| self.storage.upload(local, target));
        let discarded = self.staging.discard(local);
        result?;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStorage;

    fn manager() -> (MemoryObjectStorage, FileManager) {
        let storage = MemoryObjectStorage::new();
        let files = FileManager::new(Arc::new(storage.clone()), Arc::new(storage.clone()));
        (storage, files)
    }

    #[test]
    fn upload_file_releases_staging() {
        let (storage, files) = manager();
        files
            .upload_file(
                &CloudPath::new("clients/clients.json"),
                &FileName::json("clients"),
                b"[]",
            )
            .unwrap();

        assert_eq!(storage.get_string("clients/clients.json").as_deref(), Some("[]"));
        assert_eq!(storage.staged_count(), 0);
    }

    #[test]
    fn backup_copies_to_both_paths() {
        let (storage, files) = manager();
        storage.put("clients/clients.json", "[\"k1\"]").unwrap();

        files
            .backup_file(
                &CloudPath::new("clients/clients.json"),
                &FileName::json("clients-old"),
                1,
            )
            .unwrap();

        assert_eq!(
            storage.get_string("clients/clients.json.bak").as_deref(),
            Some("[\"k1\"]")
        );
        assert_eq!(
            storage.get_string("clients/clients.json.1.bak").as_deref(),
            Some("[\"k1\"]")
        );
    }

    #[test]
    fn backup_of_missing_file_fails() {
        let (storage, files) = manager();
        let err = files
            .backup_file(
                &CloudPath::new("clients/clients.json"),
                &FileName::json("clients-old"),
                1,
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn metadata_is_pretty_printed() {
        let (storage, files) = manager();
        let mut metadata = Metadata::new();
        metadata.set_version(7);
        let path = CloudPath::new("sites/metadata.json");

        files.upload_metadata(&metadata, "sites", &path).unwrap();

        let text = storage.get_string("sites/metadata.json").unwrap();
        assert!(text.contains("\n"));
        assert_eq!(files.download_metadata(&path).unwrap().version(), Some(7));
    }

    #[test]
    fn presence_uses_listing() {
        let (storage, files) = manager();
        let path = CloudPath::new("sites/metadata.json");
        assert!(!files.is_present(&path).unwrap());
        storage.put("sites/metadata.json", "{}").unwrap();
        assert!(files.is_present(&path).unwrap());
    }
}
