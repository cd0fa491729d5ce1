// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Configuration Entity Models
//!
//! Wire representations of the entities persisted by the store writers.
//! Every collection is written as a complete snapshot; the field names here
//! are the JSON names readers expect.
//!
//! ## Model Categories
//!
//! - **Participants**: sites, client keys, operator keys, admin users, enclaves
//! - **Key material**: encryption keys, keyset keys, cloud encryption keys, client-side keypairs
//! - **Sharing**: key ACLs, keysets, admin keysets
//! - **Services**: services and service links
//! - **Salts**: rotating salt entries

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Entities stored in map-shaped collections, keyed by an integer id.
pub trait Keyed {
    fn key(&self) -> i32;
}

// =============================================================================
// Roles and Client Types
// =============================================================================

/// Role granted to a client key, operator key, service or admin user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Generator,
    Mapper,
    IdReader,
    Sharer,
    Operator,
    Optout,
    ClientkeyIssuer,
    Maintainer,
    Administrator,
    SecretRotation,
    SharingPortal,
}

/// Kind of participant a site represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientType {
    Dsp,
    Advertiser,
    DataProvider,
    Publisher,
}

// =============================================================================
// Participants
// =============================================================================

/// A participant site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub id: i32,
    pub name: String,
    pub enabled: bool,
    #[serde(default, rename = "clientTypes")]
    pub types: BTreeSet<ClientType>,
    #[serde(default)]
    pub domain_names: BTreeSet<String>,
    #[serde(default)]
    pub app_names: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Epoch seconds.
    #[serde(default)]
    pub created: i64,
}

/// API key issued to a client of a site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientKey {
    pub key_hash: String,
    pub key_salt: String,
    pub secret: String,
    pub name: String,
    #[serde(default)]
    pub contact: String,
    pub created: i64,
    pub roles: BTreeSet<Role>,
    pub site_id: i32,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub service_id: i32,
    pub key_id: String,
}

/// API key issued to a private or public operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorKey {
    pub key_hash: String,
    pub key_salt: String,
    pub name: String,
    #[serde(default)]
    pub contact: String,
    pub protocol: String,
    pub created: i64,
    #[serde(default)]
    pub disabled: bool,
    pub site_id: Option<i32>,
    pub roles: BTreeSet<Role>,
    pub operator_type: String,
    pub key_id: String,
}

/// Administrator account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminUser {
    pub key_hash: String,
    pub key_salt: String,
    pub name: String,
    #[serde(default)]
    pub contact: String,
    pub roles: BTreeSet<Role>,
    pub created: i64,
    #[serde(default)]
    pub disabled: bool,
    pub key_id: String,
}

/// Attested enclave identity an operator may run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnclaveIdentifier {
    pub name: String,
    pub protocol: String,
    pub identifier: String,
    pub created: i64,
}

// =============================================================================
// Key Material
// =============================================================================

/// Site encryption key. All timestamps are epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionKey {
    pub id: i32,
    pub site_id: i32,
    pub created: i64,
    pub activates: i64,
    pub expires: i64,
    /// Base64 key bytes.
    pub secret: String,
}

/// Encryption key belonging to a keyset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysetKey {
    pub id: i32,
    pub keyset_id: i32,
    pub created: i64,
    pub activates: i64,
    pub expires: i64,
    pub secret: String,
}

/// Key used to encrypt site-scoped files at rest.
///
/// Also the shape of the legacy S3 encryption keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudEncryptionKey {
    pub id: i32,
    pub site_id: i32,
    pub activates: i64,
    pub created: i64,
    /// Base64 AES-256 key.
    pub secret: String,
}

impl Keyed for CloudEncryptionKey {
    fn key(&self) -> i32 {
        self.id
    }
}

/// Public/private keypair for client-side token generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSideKeypair {
    pub subscription_id: String,
    pub public_key: String,
    pub private_key: String,
    pub site_id: i32,
    #[serde(default)]
    pub contact: String,
    pub created: i64,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub name: String,
}

// =============================================================================
// Sharing
// =============================================================================

/// Which sites may decrypt data encrypted with a site's keys.
///
/// Serialized as `{"site_id": 5, "whitelist": [..]}` or
/// `{"site_id": 5, "blacklist": [..]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "AclRecord", try_from = "AclRecord")]
pub struct EncryptionKeyAcl {
    pub site_id: i32,
    pub is_whitelist: bool,
    pub accessors: BTreeSet<i32>,
}

impl Keyed for EncryptionKeyAcl {
    fn key(&self) -> i32 {
        self.site_id
    }
}

#[derive(Serialize, Deserialize)]
struct AclRecord {
    site_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    whitelist: Option<BTreeSet<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blacklist: Option<BTreeSet<i32>>,
}

impl From<EncryptionKeyAcl> for AclRecord {
    fn from(acl: EncryptionKeyAcl) -> Self {
        let (whitelist, blacklist) = if acl.is_whitelist {
            (Some(acl.accessors), None)
        } else {
            (None, Some(acl.accessors))
        };
        AclRecord {
            site_id: acl.site_id,
            whitelist,
            blacklist,
        }
    }
}

impl TryFrom<AclRecord> for EncryptionKeyAcl {
    type Error = String;

    fn try_from(record: AclRecord) -> Result<Self, Self::Error> {
        match (record.whitelist, record.blacklist) {
            (Some(accessors), None) => Ok(EncryptionKeyAcl {
                site_id: record.site_id,
                is_whitelist: true,
                accessors,
            }),
            (None, Some(accessors)) => Ok(EncryptionKeyAcl {
                site_id: record.site_id,
                is_whitelist: false,
                accessors,
            }),
            _ => Err(format!(
                "key acl for site {} needs exactly one of whitelist or blacklist",
                record.site_id
            )),
        }
    }
}

/// A named group of keys shared with a set of sites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Keyset {
    pub keyset_id: i32,
    pub site_id: i32,
    pub name: String,
    /// `None` means every site may read.
    pub allowed_sites: Option<BTreeSet<i32>>,
    pub created: i64,
    pub enabled: bool,
    #[serde(rename = "default")]
    pub is_default: bool,
}

impl Keyed for Keyset {
    fn key(&self) -> i32 {
        self.keyset_id
    }
}

/// Keyset as administered, including the client types it is shared with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminKeyset {
    pub keyset_id: i32,
    pub site_id: i32,
    pub name: String,
    pub allowed_sites: Option<BTreeSet<i32>>,
    #[serde(default)]
    pub allowed_types: BTreeSet<ClientType>,
    pub created: i64,
    pub enabled: bool,
    #[serde(rename = "default")]
    pub is_default: bool,
}

impl Keyed for AdminKeyset {
    fn key(&self) -> i32 {
        self.keyset_id
    }
}

// =============================================================================
// Services
// =============================================================================

/// A service offered to sites, with the roles its links grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub service_id: i32,
    pub site_id: i32,
    pub name: String,
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub link_id_regex: Option<String>,
}

/// Link between a service and a site's account on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceLink {
    pub link_id: String,
    pub service_id: i32,
    pub site_id: i32,
    pub name: String,
    pub roles: BTreeSet<Role>,
    #[serde(default)]
    pub disabled: bool,
}

// =============================================================================
// Salts
// =============================================================================

/// Key material attached to a salt bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub id: i32,
    pub key: Option<String>,
    pub salt: Option<String>,
}

/// One salt bucket in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltEntry {
    pub id: i64,
    /// Epoch millis.
    pub last_updated: i64,
    pub current_salt: String,
    /// Epoch millis of the next scheduled refresh.
    pub refresh_from: Option<i64>,
    pub previous_salt: Option<String>,
    pub current_key: Option<KeyMaterial>,
    pub previous_key: Option<KeyMaterial>,
}

impl SaltEntry {
    /// Entry with only the legacy `id,lastUpdated,salt` fields.
    pub fn new(id: i64, last_updated: i64, current_salt: impl Into<String>) -> Self {
        Self {
            id,
            last_updated,
            current_salt: current_salt.into(),
            refresh_from: None,
            previous_salt: None,
            current_key: None,
            previous_key: None,
        }
    }
}

fn default_true() -> bool {
    true
}
