// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Object key and file name helpers for the store layout.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `/`-separated object key in cloud storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudPath(String);

impl CloudPath {
    /// Create a path, dropping any trailing separator.
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Directory part of the key (empty for top-level keys).
    pub fn parent(&self) -> CloudPath {
        match self.0.rfind('/') {
            Some(idx) => CloudPath(self.0[..idx].to_string()),
            None => CloudPath(String::new()),
        }
    }

    /// Last segment of the key.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Append a child segment (or nested segments) to this path.
    pub fn resolve(&self, child: &str) -> CloudPath {
        let child = child.trim_start_matches('/');
        if self.0.is_empty() {
            CloudPath::new(child)
        } else {
            CloudPath::new(format!("{}/{}", self.0, child))
        }
    }

    /// Append a raw suffix to the last segment (`a/b.json` -> `a/b.json.bak`).
    pub fn with_suffix(&self, suffix: &str) -> CloudPath {
        CloudPath(format!("{}{}", self.0, suffix))
    }
}

impl fmt::Display for CloudPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CloudPath {
    fn from(value: &str) -> Self {
        CloudPath::new(value)
    }
}

impl From<String> for CloudPath {
    fn from(value: String) -> Self {
        CloudPath::new(value)
    }
}

/// A file name split into prefix and suffix (`clients` + `.json`).
///
/// The split matters for local staging, where the prefix and suffix frame a
/// unique temporary name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    prefix: String,
    suffix: String,
}

impl FileName {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// A `.json` file name.
    pub fn json(prefix: impl Into<String>) -> Self {
        Self::new(prefix, ".json")
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.suffix)
    }
}
