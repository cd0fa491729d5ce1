// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem-backed storage ports.
//!
//! [`LocalFsObjectStorage`] maps object keys onto files below a root
//! directory, so a mounted bucket or a plain directory can stand in for the
//! cloud store. [`TmpFileStorage`] stages content in a temp directory.
//!
//! ```text
//! {root}/
//!   sites/
//!     metadata.json
//!     sites.json
//!     site/{site_id}/
//!       metadata.json
//!       sites.json
//!   salts/
//!     metadata.json
//!     salts.txt.{effective_millis}
//! ```

use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use super::paths::{CloudPath, FileName};
use super::ports::{FileStorage, ObjectStorage};
use crate::error::{StoreError, StoreResult};

/// Object storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFsObjectStorage {
    root: PathBuf,
}

impl LocalFsObjectStorage {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file backing an object key.
    ///
    /// Every segment must be a plain name; `..`, `.` and drive or root
    /// prefixes are rejected so keys cannot escape the root.
    pub fn object_path(&self, key: &CloudPath) -> StoreResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.as_str().split('/').filter(|segment| !segment.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => path.push(name),
                _ => return Err(StoreError::InvalidPath(key.to_string())),
            }
        }
        Ok(path)
    }

    fn collect_keys(&self, dir: &Path, relative: &str, keys: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let key = if relative.is_empty() {
                name
            } else {
                format!("{relative}/{name}")
            };
            let path = entry.path();
            if path.is_dir() {
                self.collect_keys(&path, &key, keys)?;
            } else if path.is_file() && !key.ends_with(".tmp") {
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStorage for LocalFsObjectStorage {
    fn list(&self, prefix: &CloudPath) -> StoreResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        self.collect_keys(&self.root, "", &mut keys)?;
        keys.retain(|key| key.starts_with(prefix.as_str()));
        keys.sort();
        Ok(keys)
    }

    fn upload(&self, local_path: &Path, remote_path: &CloudPath) -> StoreResult<()> {
        let target = self.object_path(remote_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        // Copy next to the target, then rename so readers never see a partial object
        let temp_path = target.with_file_name(format!(
            "{}.{}.tmp",
            remote_path.file_name(),
            uuid::Uuid::new_v4()
        ));
        if let Err(e) = fs::copy(local_path, &temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(StoreError::Io(e));
        }
        if let Err(e) = fs::rename(&temp_path, &target) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Failed to remove temp object"
                );
            }
            return Err(StoreError::Storage {
                path: remote_path.to_string(),
                message: e.to_string(),
            });
        }

        tracing::debug!(remote_path = %remote_path, "Uploaded object");
        Ok(())
    }

    fn download(&self, remote_path: &CloudPath) -> StoreResult<Vec<u8>> {
        match fs::read(self.object_path(remote_path)?) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(remote_path.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Staging area backed by a local temp directory.
///
/// Files are named `<prefix>-<uuid><suffix>` and removed on
/// [`FileStorage::discard`].
#[derive(Debug, Clone)]
pub struct TmpFileStorage {
    dir: PathBuf,
}

impl TmpFileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for TmpFileStorage {
    fn default() -> Self {
        Self::new(env::temp_dir())
    }
}

impl FileStorage for TmpFileStorage {
    fn create(&self, name: &FileName, content: &[u8]) -> StoreResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "{}-{}{}",
            name.prefix(),
            uuid::Uuid::new_v4(),
            name.suffix()
        ));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        Ok(path)
    }

    fn discard(&self, local_path: &Path) -> StoreResult<()> {
        match fs::remove_file(local_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
