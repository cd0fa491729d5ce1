// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Encryption Decorator
//!
//! Wraps any [`DocumentWriter`] so the content it uploads is the JSON
//! envelope below instead of plaintext:
//!
//! ```json
//! {
//!   "key_id": 12,
//!   "encryption_version": "1.0",
//!   "encrypted_payload": "<base64(nonce || ciphertext || tag)>"
//! }
//! ```
//!
//! The key is the site's cloud encryption key with the highest id. Without a
//! site or a key the upload fails; plaintext is never written instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use super::DocumentWriter;
use crate::crypto;
use crate::error::{StoreError, StoreResult};
use crate::models::CloudEncryptionKey;
use crate::store::metadata::{AdditionalFields, Metadata};
use crate::store::scope::StoreScope;

pub const ENCRYPTION_VERSION: &str = "1.0";

/// Source of cloud encryption keys.
pub trait EncryptionKeyProvider: Send + Sync {
    fn encryption_keys(&self) -> StoreResult<Vec<CloudEncryptionKey>>;

    /// Active key for a site: the one with the highest id.
    fn key_for_site(&self, site_id: i32) -> StoreResult<CloudEncryptionKey> {
        self.encryption_keys()?
            .into_iter()
            .filter(|key| key.site_id == site_id)
            .max_by_key(|key| key.id)
            .ok_or_else(|| {
                StoreError::IllegalState(format!(
                    "No encryption keys available for site ID: {site_id}"
                ))
            })
    }

    fn key_by_id(&self, key_id: i32) -> StoreResult<CloudEncryptionKey> {
        self.encryption_keys()?
            .into_iter()
            .find(|key| key.id == key_id)
            .ok_or_else(|| StoreError::IllegalState(format!("No encryption key with ID: {key_id}")))
    }
}

impl EncryptionKeyProvider for BTreeMap<i32, CloudEncryptionKey> {
    fn encryption_keys(&self) -> StoreResult<Vec<CloudEncryptionKey>> {
        Ok(self.values().cloned().collect())
    }
}

impl EncryptionKeyProvider for Vec<CloudEncryptionKey> {
    fn encryption_keys(&self) -> StoreResult<Vec<CloudEncryptionKey>> {
        Ok(self.clone())
    }
}

/// Wire format of an encrypted content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub key_id: i32,
    pub encryption_version: String,
    pub encrypted_payload: String,
}

impl EncryptedEnvelope {
    /// Encrypt `plaintext` under `key`.
    pub fn seal(plaintext: &[u8], key: &CloudEncryptionKey) -> StoreResult<Self> {
        let payload = crypto::encrypt(plaintext, &key.secret)?;
        Ok(Self {
            key_id: key.id,
            encryption_version: ENCRYPTION_VERSION.to_string(),
            encrypted_payload: Base64::encode_string(&payload),
        })
    }

    pub fn parse(content: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(content)
            .map_err(|e| StoreError::MalformedContent(format!("invalid encrypted envelope: {e}")))
    }

    /// Decrypt with `key`, which must be the key named by `key_id`.
    pub fn open(&self, key: &CloudEncryptionKey) -> StoreResult<Vec<u8>> {
        if key.id != self.key_id {
            return Err(StoreError::Decryption(format!(
                "envelope was sealed with key {} but key {} was supplied",
                self.key_id, key.id
            )));
        }
        let payload = Base64::decode_vec(&self.encrypted_payload)
            .map_err(|e| StoreError::Decryption(format!("invalid base64 payload: {e}")))?;
        crypto::decrypt(&payload, &key.secret)
    }

    pub fn to_pretty_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Decrypt an envelope using the key it names.
pub fn decrypt_envelope(content: &[u8], keys: &dyn EncryptionKeyProvider) -> StoreResult<String> {
    let envelope = EncryptedEnvelope::parse(content)?;
    let key = keys.key_by_id(envelope.key_id)?;
    let plaintext = envelope.open(&key)?;
    String::from_utf8(plaintext)
        .map_err(|e| StoreError::MalformedContent(format!("decrypted content is not UTF-8: {e}")))
}

/// Decorator that encrypts content before the wrapped writer stores it.
pub struct EncryptingWriter<W> {
    inner: W,
    keys: Arc<dyn EncryptionKeyProvider>,
    site_id: Option<i32>,
}

impl<W: DocumentWriter> EncryptingWriter<W> {
    /// Encrypt for the site of the wrapped writer's scope.
    pub fn new(inner: W, keys: Arc<dyn EncryptionKeyProvider>) -> Self {
        let site_id = inner.scope().site_id();
        Self {
            inner,
            keys,
            site_id,
        }
    }

    /// Encrypt for an explicit site regardless of scope.
    pub fn for_site(inner: W, keys: Arc<dyn EncryptionKeyProvider>, site_id: i32) -> Self {
        Self {
            inner,
            keys,
            site_id: Some(site_id),
        }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    pub fn site_id(&self) -> Option<i32> {
        self.site_id
    }

    /// Decrypt content written by this writer.
    pub fn decrypt(&self, content: &[u8]) -> StoreResult<String> {
        let site_id = self.require_site()?;
        let envelope = EncryptedEnvelope::parse(content)?;
        let key = self.keys.key_by_id(envelope.key_id)?;
        if key.site_id != site_id {
            return Err(StoreError::IllegalState(format!(
                "No matching encryption key found for site ID: {site_id} and key ID: {}",
                envelope.key_id
            )));
        }
        let plaintext = envelope.open(&key)?;
        String::from_utf8(plaintext).map_err(|e| {
            StoreError::MalformedContent(format!("decrypted content is not UTF-8: {e}"))
        })
    }

    fn require_site(&self) -> StoreResult<i32> {
        self.site_id
            .ok_or_else(|| StoreError::IllegalState("Site ID is not set.".to_string()))
    }
}

impl<W: DocumentWriter> DocumentWriter for EncryptingWriter<W> {
    fn upload(&self, content: &str, extra: Option<&AdditionalFields>) -> StoreResult<Metadata> {
        let site_id = self.require_site()?;
        let key = self.keys.key_for_site(site_id)?;
        let envelope = EncryptedEnvelope::seal(content.as_bytes(), &key)?;

        let metadata = self.inner.upload(&envelope.to_pretty_json()?, extra)?;

        tracing::info!(
            site_id,
            key_id = key.id,
            data_type = %self.inner.data_type(),
            "File encryption completed"
        );
        Ok(metadata)
    }

    fn rewrite_meta(&self) -> StoreResult<()> {
        self.inner.rewrite_meta()
    }

    fn data_type(&self) -> &str {
        self.inner.data_type()
    }

    fn scope(&self) -> &StoreScope {
        self.inner.scope()
    }
}
