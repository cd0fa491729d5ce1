// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Metadata Documents
//!
//! One metadata document exists per data type and scope. It records the
//! write version, the generation time and where each data type's content
//! lives:
//!
//! ```json
//! {
//!   "version": 1700000000000,
//!   "generated": 1700000000,
//!   "client_keys": { "location": "clients/clients.json" },
//!   "max_key_id": 42
//! }
//! ```
//!
//! Unknown top-level fields are kept as-is so documents written by other
//! tools survive a rewrite.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::storage::CloudPath;

pub const VERSION_FIELD: &str = "version";
pub const GENERATED_FIELD: &str = "generated";
pub const LOCATION_FIELD: &str = "location";

/// A metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored document. The top level must be a JSON object.
    pub fn from_slice(bytes: &[u8]) -> StoreResult<Self> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::MalformedContent(format!(
                "metadata must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn to_pretty_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.0)?)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn version(&self) -> Option<i64> {
        self.0.get(VERSION_FIELD).and_then(Value::as_i64)
    }

    pub fn set_version(&mut self, version: i64) {
        self.insert(VERSION_FIELD, version);
    }

    /// Stamp `candidate`, or the recorded version plus one when `candidate`
    /// would not move the version forward. Returns the stamped version.
    pub fn advance_version(&mut self, candidate: i64) -> i64 {
        let version = match self.version() {
            Some(current) if candidate <= current => current + 1,
            _ => candidate,
        };
        self.set_version(version);
        version
    }

    pub fn generated(&self) -> Option<i64> {
        self.0.get(GENERATED_FIELD).and_then(Value::as_i64)
    }

    pub fn set_generated(&mut self, generated: i64) {
        self.insert(GENERATED_FIELD, generated);
    }

    /// Content location recorded for `data_type`.
    pub fn location_of(&self, data_type: &str) -> Option<CloudPath> {
        self.0
            .get(data_type)
            .and_then(|container| container.get(LOCATION_FIELD))
            .and_then(Value::as_str)
            .map(CloudPath::new)
    }

    /// Record the content location for `data_type`, replacing the container.
    pub fn set_location(&mut self, data_type: &str, location: &CloudPath) {
        let mut container = Map::new();
        container.insert(
            LOCATION_FIELD.to_string(),
            Value::String(location.to_string()),
        );
        self.0.insert(data_type.to_string(), Value::Object(container));
    }

    /// Location for `data_type`, or a malformed-metadata error naming `path`.
    pub fn require_location(&self, data_type: &str, path: &CloudPath) -> StoreResult<CloudPath> {
        self.location_of(data_type)
            .ok_or_else(|| StoreError::MalformedMetadata {
                path: path.to_string(),
                reason: format!("missing {data_type}.location"),
            })
    }

    /// Copy every extra field into the document, overwriting same-named keys.
    pub fn merge_extra(&mut self, extra: &AdditionalFields) {
        for (key, value) in extra.to_map() {
            self.0.insert(key, value);
        }
    }
}

/// Caller-supplied fields merged into metadata on upload.
///
/// Known fields are typed; anything else rides along in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalFields {
    /// Highest encryption key id allocated so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_key_id: Option<i32>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl AdditionalFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_key_id(max_key_id: i32) -> Self {
        Self {
            max_key_id: Some(max_key_id),
            other: Map::new(),
        }
    }

    /// Add a free-form field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.other.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.max_key_id.is_none() && self.other.is_empty()
    }

    /// Flatten into top-level metadata fields.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.other.clone();
        if let Some(max_key_id) = self.max_key_id {
            map.insert("max_key_id".to_string(), Value::from(max_key_id));
        }
        map
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
