// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Store Configuration
//!
//! Environment variable names, default values and the [`StoreConfig`]
//! document used to wire up the store writers.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `STORAGE_ROOT` | Root directory of the filesystem object store | `/data/admin-store` |
//! | `SALT_SNAPSHOT_LOCATION_PREFIX` | Key prefix for plain salt snapshots | `salts/salts.txt.` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |
//!
//! Metadata paths are only configurable through the JSON document, one
//! entry per data type:
//!
//! ```json
//! {
//!   "storage_root": "/data/admin-store",
//!   "metadata_paths": { "sites": "sites/metadata.json" }
//! }
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::logging::LogFormat;
use crate::storage::CloudPath;

/// Environment variable name for the filesystem object store root.
pub const STORAGE_ROOT_ENV: &str = "STORAGE_ROOT";

/// Environment variable name for the plain salt snapshot key prefix.
pub const SALT_SNAPSHOT_LOCATION_PREFIX_ENV: &str = "SALT_SNAPSHOT_LOCATION_PREFIX";

/// Environment variable name for the logging format.
///
/// Accepted values: `json`, `pretty`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_STORAGE_ROOT: &str = "/data/admin-store";
pub const DEFAULT_SALT_SNAPSHOT_LOCATION_PREFIX: &str = "salts/salts.txt.";

/// Data types with a configurable metadata path.
pub const DATA_TYPES: &[&str] = &[
    "sites",
    "client_keys",
    "keys",
    "keys_acl",
    "keysets",
    "keyset_keys",
    "services",
    "service_links",
    "s3encryption_keys",
    "cloud_encryption_keys",
    "client_side_keypairs",
    "admin_keysets",
    "operators",
    "admins",
    "enclaves",
    "partners",
    "salts",
];

/// Configuration for the store pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub storage_root: PathBuf,
    pub salt_snapshot_location_prefix: String,
    /// Overrides of the default `<data_type>/metadata.json` paths.
    pub metadata_paths: BTreeMap<String, String>,
    pub log_format: LogFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            salt_snapshot_location_prefix: DEFAULT_SALT_SNAPSHOT_LOCATION_PREFIX.to_string(),
            metadata_paths: BTreeMap::new(),
            log_format: LogFormat::default(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> StoreResult<Self> {
        let mut config = Self::default();
        if let Ok(root) = env::var(STORAGE_ROOT_ENV) {
            config.storage_root = PathBuf::from(root);
        }
        if let Ok(prefix) = env::var(SALT_SNAPSHOT_LOCATION_PREFIX_ENV) {
            config.salt_snapshot_location_prefix = prefix;
        }
        if let Ok(format) = env::var(LOG_FORMAT_ENV) {
            config.log_format = format.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> StoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject empty paths and prefixes.
    pub fn validate(&self) -> StoreResult<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(StoreError::Config("storage_root is empty".to_string()));
        }
        if self.salt_snapshot_location_prefix.trim().is_empty() {
            return Err(StoreError::Config(
                "salt_snapshot_location_prefix is empty".to_string(),
            ));
        }
        for (data_type, path) in &self.metadata_paths {
            if path.trim().is_empty() {
                return Err(StoreError::Config(format!(
                    "metadata path for {data_type} is empty"
                )));
            }
        }
        Ok(())
    }

    /// Metadata path for a data type.
    pub fn metadata_path(&self, data_type: &str) -> CloudPath {
        match self.metadata_paths.get(data_type) {
            Some(path) => CloudPath::new(path.as_str()),
            None => CloudPath::new(data_type).resolve("metadata.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.storage_root, PathBuf::from("/data/admin-store"));
        assert_eq!(config.salt_snapshot_location_prefix, "salts/salts.txt.");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_metadata_paths_follow_data_type() {
        let config = StoreConfig::default();
        for data_type in DATA_TYPES {
            assert_eq!(
                config.metadata_path(data_type).as_str(),
                format!("{data_type}/metadata.json")
            );
        }
    }

    #[test]
    fn json_overrides_single_path() {
        let config = StoreConfig::from_json_str(
            r#"{
                "storage_root": "/tmp/store",
                "metadata_paths": { "client_keys": "clients/metadata.json" },
                "log_format": "json"
            }"#,
        )
        .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/tmp/store"));
        assert_eq!(
            config.metadata_path("client_keys").as_str(),
            "clients/metadata.json"
        );
        assert_eq!(config.metadata_path("sites").as_str(), "sites/metadata.json");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "salt_snapshot_location_prefix": "" }"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn empty_metadata_path_is_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "metadata_paths": { "sites": " " } }"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
