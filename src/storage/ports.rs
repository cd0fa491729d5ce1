// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage ports consumed by the store write pipeline.
//!
//! Content travels in two hops: it is first staged as a local file through a
//! [`FileStorage`], then handed to the [`ObjectStorage`] by local path.

use std::path::{Path, PathBuf};

use super::paths::{CloudPath, FileName};
use crate::error::StoreResult;

/// Cloud object store keyed by `/`-separated paths.
pub trait ObjectStorage: Send + Sync {
    /// List object keys starting with `prefix`. Empty when nothing matches.
    fn list(&self, prefix: &CloudPath) -> StoreResult<Vec<String>>;

    /// Upload the staged local file to `remote_path`, replacing any object there.
    fn upload(&self, local_path: &Path, remote_path: &CloudPath) -> StoreResult<()>;

    /// Download the object at `remote_path`.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) when
    /// the object does not exist.
    fn download(&self, remote_path: &CloudPath) -> StoreResult<Vec<u8>>;
}

/// Local staging area for content about to be uploaded.
pub trait FileStorage: Send + Sync {
    /// Stage `content` under a unique local path derived from `name`.
    fn create(&self, name: &FileName, content: &[u8]) -> StoreResult<PathBuf>;

    /// Release a staged file once it has been uploaded.
    fn discard(&self, _local_path: &Path) -> StoreResult<()> {
        Ok(())
    }
}
