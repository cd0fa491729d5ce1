// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path computation for global, per-site and encrypted per-site data.
//!
//! ```text
//! sites/metadata.json                          Global
//! sites/sites.json
//! sites/site/5/metadata.json                   Site(5)
//! sites/site/5/sites.json
//! sites/encrypted/5_private/metadata.json      Encrypted(5, private)
//! sites/encrypted/5_private/sites.json
//! ```

use std::fmt;

use crate::storage::CloudPath;

/// Where a data type's metadata and content live.
///
/// Every variant is built from the global metadata path of the data type;
/// site variants place their own metadata file, with the same file name,
/// in a per-site directory next to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreScope {
    Global {
        metadata_path: CloudPath,
    },
    Site {
        metadata_path: CloudPath,
        site_id: i32,
    },
    Encrypted {
        metadata_path: CloudPath,
        site_id: i32,
        public: bool,
    },
}

impl StoreScope {
    pub fn global(metadata_path: impl Into<CloudPath>) -> Self {
        StoreScope::Global {
            metadata_path: metadata_path.into(),
        }
    }

    pub fn site(metadata_path: impl Into<CloudPath>, site_id: i32) -> Self {
        StoreScope::Site {
            metadata_path: metadata_path.into(),
            site_id,
        }
    }

    pub fn encrypted(metadata_path: impl Into<CloudPath>, site_id: i32, public: bool) -> Self {
        StoreScope::Encrypted {
            metadata_path: metadata_path.into(),
            site_id,
            public,
        }
    }

    /// The global metadata path this scope was derived from.
    pub fn root_metadata_path(&self) -> &CloudPath {
        match self {
            StoreScope::Global { metadata_path }
            | StoreScope::Site { metadata_path, .. }
            | StoreScope::Encrypted { metadata_path, .. } => metadata_path,
        }
    }

    /// Site this scope belongs to, if any.
    pub fn site_id(&self) -> Option<i32> {
        match self {
            StoreScope::Global { .. } => None,
            StoreScope::Site { site_id, .. } | StoreScope::Encrypted { site_id, .. } => {
                Some(*site_id)
            }
        }
    }

    /// Directory holding this scope's metadata and content.
    pub fn directory(&self) -> CloudPath {
        let root = self.root_metadata_path().parent();
        match self {
            StoreScope::Global { .. } => root,
            StoreScope::Site { site_id, .. } => root.resolve("site").resolve(&site_id.to_string()),
            StoreScope::Encrypted {
                site_id, public, ..
            } => {
                let visibility = if *public { "public" } else { "private" };
                root.resolve("encrypted")
                    .resolve(&format!("{site_id}_{visibility}"))
            }
        }
    }

    /// Canonical metadata document path for this scope.
    pub fn metadata_path(&self) -> CloudPath {
        match self {
            StoreScope::Global { metadata_path } => metadata_path.clone(),
            _ => self
                .directory()
                .resolve(self.root_metadata_path().file_name()),
        }
    }

    /// Resolve a content file name inside this scope.
    pub fn resolve(&self, file: &str) -> CloudPath {
        self.directory().resolve(file)
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreScope::Global { .. } => f.write_str("global"),
            StoreScope::Site { site_id, .. } => write!(f, "site {site_id}"),
            StoreScope::Encrypted {
                site_id, public, ..
            } => {
                let visibility = if *public { "public" } else { "private" };
                write!(f, "encrypted site {site_id} ({visibility})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = "sites/test-metadata.json";

    #[test]
    fn global_scope_uses_root_paths() {
        let scope = StoreScope::global(METADATA);
        assert_eq!(scope.metadata_path().as_str(), "sites/test-metadata.json");
        assert_eq!(scope.resolve("sites.json").as_str(), "sites/sites.json");
        assert_eq!(scope.site_id(), None);
    }

    #[test]
    fn site_scope_nests_under_site_directory() {
        let scope = StoreScope::site(METADATA, 5);
        assert_eq!(
            scope.metadata_path().as_str(),
            "sites/site/5/test-metadata.json"
        );
        assert_eq!(scope.resolve("sites.json").as_str(), "sites/site/5/sites.json");
        assert_eq!(scope.site_id(), Some(5));
    }

    #[test]
    fn encrypted_scope_distinguishes_visibility() {
        let private = StoreScope::encrypted(METADATA, 5, false);
        let public = StoreScope::encrypted(METADATA, 5, true);
        assert_eq!(
            private.resolve("sites.json").as_str(),
            "sites/encrypted/5_private/sites.json"
        );
        assert_eq!(
            public.metadata_path().as_str(),
            "sites/encrypted/5_public/test-metadata.json"
        );
    }

    #[test]
    fn distinct_sites_never_share_paths() {
        let five = StoreScope::site(METADATA, 5);
        let fifty = StoreScope::site(METADATA, 50);
        assert_ne!(five.metadata_path(), fifty.metadata_path());
        assert!(!fifty
            .metadata_path()
            .as_str()
            .starts_with(five.directory().with_suffix("/").as_str()));
    }

    #[test]
    fn site_scope_never_targets_global_metadata() {
        let global = StoreScope::global(METADATA);
        for site_id in [1, 5, 6] {
            assert_ne!(
                StoreScope::site(METADATA, site_id).metadata_path(),
                global.metadata_path()
            );
        }
    }
}
