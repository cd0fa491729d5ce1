// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory object storage.
//!
//! Implements both storage ports so a single instance can back a whole
//! store in tests: staged files live in a side table keyed by a synthetic
//! local path, and uploads move them into the object table.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::paths::{CloudPath, FileName};
use super::ports::{FileStorage, ObjectStorage};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    staged: HashMap<PathBuf, Vec<u8>>,
}

/// Thread-safe in-memory object store. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStorage {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an object directly, bypassing staging.
    pub fn put(&self, path: &str, content: impl Into<Vec<u8>>) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::poisoned("memory storage"))?;
        inner.objects.insert(path.to_string(), content.into());
        Ok(())
    }

    /// Read an object as UTF-8 text, if present.
    pub fn get_string(&self, path: &str) -> Option<String> {
        let inner = self.inner.read().ok()?;
        inner
            .objects
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.objects.contains_key(path))
            .unwrap_or(false)
    }

    /// All object keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|inner| inner.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of files staged and not yet discarded.
    pub fn staged_count(&self) -> usize {
        self.inner.read().map(|inner| inner.staged.len()).unwrap_or(0)
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn list(&self, prefix: &CloudPath) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned("memory storage"))?;
        Ok(inner
            .objects
            .range(prefix.as_str().to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix.as_str()))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn upload(&self, local_path: &Path, remote_path: &CloudPath) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::poisoned("memory storage"))?;
        let content = match inner.staged.get(local_path) {
            Some(bytes) => bytes.clone(),
            None => fs::read(local_path)?,
        };
        inner.objects.insert(remote_path.as_str().to_string(), content);
        Ok(())
    }

    fn download(&self, remote_path: &CloudPath) -> StoreResult<Vec<u8>> {
        let inner = self.inner.read().map_err(|_| StoreError::poisoned("memory storage"))?;
        inner
            .objects
            .get(remote_path.as_str())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(remote_path.to_string()))
    }
}

impl FileStorage for MemoryObjectStorage {
    fn create(&self, name: &FileName, content: &[u8]) -> StoreResult<PathBuf> {
        let local = PathBuf::from(format!(
            "memory/{}-{}{}",
            name.prefix(),
            uuid::Uuid::new_v4(),
            name.suffix()
        ));
        let mut inner = self.inner.write().map_err(|_| StoreError::poisoned("memory storage"))?;
        inner.staged.insert(local.clone(), content.to_vec());
        Ok(local)
    }

    fn discard(&self, local_path: &Path) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::poisoned("memory storage"))?;
        inner.staged.remove(local_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_matches_key_prefix() {
        let storage = MemoryObjectStorage::new();
        storage.put("sites/metadata.json", "{}").unwrap();
        storage.put("sites/site/5/sites.json", "[]").unwrap();
        storage.put("sites/site/55/sites.json", "[]").unwrap();
        storage.put("clients/clients.json", "[]").unwrap();

        let listed = storage.list(&CloudPath::new("sites/site/5")).unwrap();
        assert_eq!(
            listed,
            vec![
                "sites/site/5/sites.json".to_string(),
                "sites/site/55/sites.json".to_string()
            ]
        );
        assert!(storage.list(&CloudPath::new("keys")).unwrap().is_empty());
    }

    #[test]
    fn staged_upload_and_download() {
        let storage = MemoryObjectStorage::new();
        let local = storage.create(&FileName::json("sites"), b"[1,2]").unwrap();
        assert_eq!(storage.staged_count(), 1);

        storage.upload(&local, &CloudPath::new("sites/sites.json")).unwrap();
        storage.discard(&local).unwrap();

        assert_eq!(storage.staged_count(), 0);
        assert_eq!(
            storage.download(&CloudPath::new("sites/sites.json")).unwrap(),
            b"[1,2]".to_vec()
        );
    }

    #[test]
    fn download_missing_is_not_found() {
        let storage = MemoryObjectStorage::new();
        let err = storage.download(&CloudPath::new("nope.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn clones_share_objects() {
        let storage = MemoryObjectStorage::new();
        let other = storage.clone();
        storage.put("a.json", "1").unwrap();
        assert_eq!(other.get_string("a.json").as_deref(), Some("1"));
    }
}
