// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error type shared by the storage ports and the store write pipeline.

use std::io;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Local staging or filesystem backend I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Object key that cannot be mapped onto the backend.
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    /// Object does not exist in storage.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend-specific failure (permission, transport).
    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },

    /// Configuration or state prevents the operation from running.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Metadata document is missing a required field.
    #[error("Malformed metadata at {path}: {reason}")]
    MalformedMetadata { path: String, reason: String },

    /// Content file or envelope could not be parsed.
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// True when the error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        StoreError::IllegalState(format!("{what} lock poisoned"))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        assert!(StoreError::NotFound("sites/metadata.json".to_string()).is_not_found());
        assert!(StoreError::Io(io::Error::new(io::ErrorKind::NotFound, "gone")).is_not_found());
        assert!(!StoreError::IllegalState("no key".to_string()).is_not_found());
        assert!(!StoreError::InvalidPath("../x".to_string()).is_not_found());
    }

    #[test]
    fn display_includes_context() {
        let err = StoreError::MalformedMetadata {
            path: "sites/metadata.json".to_string(),
            reason: "missing version".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed metadata at sites/metadata.json: missing version"
        );
    }
}
