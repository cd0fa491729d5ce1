// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Entity Codecs
//!
//! One codec per entity type fixes its data type name, content file,
//! backup file and JSON shape. The generic writer, reader and fan-out writer
//! are parameterised by these codecs instead of being written per entity.
//!
//! | Codec | data type | file | backup |
//! |-------|-----------|------|--------|
//! | [`Sites`] | `sites` | `sites.json` | `sites-old` |
//! | [`ClientKeys`] | `client_keys` | `clients.json` | `clients-old` |
//! | [`EncryptionKeys`] | `keys` | `keys.json` | `keys-old` |
//! | [`KeyAcls`] | `keys_acl` | `keys_acl.json` | `keys_acl-old` |
//! | [`Keysets`] | `keysets` | `keysets.json` | - |
//! | [`KeysetKeys`] | `keyset_keys` | `keyset_keys.json` | - |
//! | [`Services`] | `services` | `services.json` | - |
//! | [`ServiceLinks`] | `service_links` | `service_links.json` | - |
//! | [`S3Keys`] | `s3encryption_keys` | `s3encryption_keys.json` | - |
//! | [`CloudEncryptionKeys`] | `cloud_encryption_keys` | `cloud_encryption_keys.json` | - |
//! | [`ClientSideKeypairs`] | `client_side_keypairs` | `client_side_keypairs.json` | - |
//! | [`AdminKeysets`] | `admin_keysets` | `admin_keysets.json` | - |
//! | [`OperatorKeys`] | `operators` | `operators.json` | `operators-old` |
//! | [`AdminUsers`] | `admins` | `admins.json` | `admins-old` |
//! | [`Enclaves`] | `enclaves` | `enclaves.json` | - |
//! | [`Partners`] | `partners` | `partners.json` | `partners-old` |
//!
//! List entities serialize as a JSON array in collection order. Map entities
//! serialize as a JSON array of their values in key order.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use super::multi_scope::{are_collections_equal, are_maps_equal};
use crate::error::StoreResult;
use crate::models::{
    AdminKeyset, AdminUser, ClientKey, ClientSideKeypair, CloudEncryptionKey, EnclaveIdentifier,
    EncryptionKey, EncryptionKeyAcl, Keyed, Keyset, KeysetKey, OperatorKey, Service, ServiceLink,
    Site,
};
use crate::storage::FileName;

/// Serialization contract for one entity type.
pub trait EntityCodec: Send + Sync + 'static {
    type Collection: Clone + Default + Debug + PartialEq + Send + Sync;

    /// Key of the location container in metadata.
    const DATA_TYPE: &'static str;
    const FILE_PREFIX: &'static str;
    const BACKUP_PREFIX: Option<&'static str>;
    /// Global-only type whose metadata is provisioned out of band.
    const LEGACY: bool = false;

    fn serialize(collection: &Self::Collection) -> StoreResult<String>;

    fn deserialize(content: &[u8]) -> StoreResult<Self::Collection>;

    /// Order-insensitive comparison used to skip unchanged writes.
    fn same_content(a: &Self::Collection, b: &Self::Collection) -> bool;

    fn data_file() -> FileName {
        FileName::json(Self::FILE_PREFIX)
    }

    fn backup_file() -> Option<FileName> {
        Self::BACKUP_PREFIX.map(FileName::json)
    }
}

/// Pretty-printed JSON array of the items, in order.
pub fn serialize_list<T: Serialize>(items: &[T]) -> StoreResult<String> {
    Ok(serde_json::to_string_pretty(items)?)
}

pub fn deserialize_list<T: DeserializeOwned>(content: &[u8]) -> StoreResult<Vec<T>> {
    Ok(serde_json::from_slice(content)?)
}

/// Pretty-printed JSON array of the map's values, in key order.
pub fn serialize_map<T: Serialize>(map: &BTreeMap<i32, T>) -> StoreResult<String> {
    let values: Vec<&T> = map.values().collect();
    Ok(serde_json::to_string_pretty(&values)?)
}

/// Parse a JSON array and key each item. Later duplicates win.
pub fn deserialize_map<T: DeserializeOwned + Keyed>(
    content: &[u8],
) -> StoreResult<BTreeMap<i32, T>> {
    let items: Vec<T> = serde_json::from_slice(content)?;
    Ok(items.into_iter().map(|item| (item.key(), item)).collect())
}

macro_rules! list_codec {
    ($(#[$doc:meta])* $codec:ident, $item:ty, $data_type:literal, $file:literal, $backup:expr) => {
        list_codec!($(#[$doc])* $codec, $item, $data_type, $file, $backup, false);
    };
    ($(#[$doc:meta])* $codec:ident, $item:ty, $data_type:literal, $file:literal, $backup:expr, $legacy:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $codec;

        impl EntityCodec for $codec {
            type Collection = Vec<$item>;

            const DATA_TYPE: &'static str = $data_type;
            const FILE_PREFIX: &'static str = $file;
            const BACKUP_PREFIX: Option<&'static str> = $backup;
            const LEGACY: bool = $legacy;

            fn serialize(collection: &Self::Collection) -> StoreResult<String> {
                serialize_list(collection)
            }

            fn deserialize(content: &[u8]) -> StoreResult<Self::Collection> {
                deserialize_list(content)
            }

            fn same_content(a: &Self::Collection, b: &Self::Collection) -> bool {
                are_collections_equal(a, b)
            }
        }
    };
}

macro_rules! map_codec {
    ($(#[$doc:meta])* $codec:ident, $item:ty, $data_type:literal, $file:literal, $backup:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $codec;

        impl EntityCodec for $codec {
            type Collection = BTreeMap<i32, $item>;

            const DATA_TYPE: &'static str = $data_type;
            const FILE_PREFIX: &'static str = $file;
            const BACKUP_PREFIX: Option<&'static str> = $backup;

            fn serialize(collection: &Self::Collection) -> StoreResult<String> {
                serialize_map(collection)
            }

            fn deserialize(content: &[u8]) -> StoreResult<Self::Collection> {
                deserialize_map(content)
            }

            fn same_content(a: &Self::Collection, b: &Self::Collection) -> bool {
                are_maps_equal(a, b)
            }
        }
    };
}

// =============================================================================
// Scoped Entities
// =============================================================================

list_codec!(
    /// Participant sites.
    Sites, Site, "sites", "sites", Some("sites-old")
);
list_codec!(
    /// Client API keys.
    ClientKeys, ClientKey, "client_keys", "clients", Some("clients-old")
);
list_codec!(
    /// Site encryption keys. Writes usually carry `max_key_id`.
    EncryptionKeys, EncryptionKey, "keys", "keys", Some("keys-old")
);
map_codec!(
    /// Key ACLs keyed by site id.
    KeyAcls, EncryptionKeyAcl, "keys_acl", "keys_acl", Some("keys_acl-old")
);
map_codec!(
    /// Keysets keyed by keyset id.
    Keysets, Keyset, "keysets", "keysets", None
);
list_codec!(KeysetKeys, KeysetKey, "keyset_keys", "keyset_keys", None);
list_codec!(Services, Service, "services", "services", None);
list_codec!(ServiceLinks, ServiceLink, "service_links", "service_links", None);
map_codec!(
    /// Legacy S3 encryption keys keyed by key id.
    S3Keys, CloudEncryptionKey, "s3encryption_keys", "s3encryption_keys", None
);
map_codec!(
    /// Cloud encryption keys keyed by key id.
    CloudEncryptionKeys, CloudEncryptionKey, "cloud_encryption_keys", "cloud_encryption_keys", None
);
list_codec!(
    ClientSideKeypairs,
    ClientSideKeypair,
    "client_side_keypairs",
    "client_side_keypairs",
    None
);
map_codec!(AdminKeysets, AdminKeyset, "admin_keysets", "admin_keysets", None);

// =============================================================================
// Legacy Global Entities
// =============================================================================

list_codec!(
    /// Operator keys.
    OperatorKeys, OperatorKey, "operators", "operators", Some("operators-old"), true
);
list_codec!(
    /// Admin users.
    AdminUsers, AdminUser, "admins", "admins", Some("admins-old"), true
);
list_codec!(
    /// Enclave identifiers.
    Enclaves, EnclaveIdentifier, "enclaves", "enclaves", None, true
);
list_codec!(
    /// Partner configurations, stored verbatim.
    Partners, serde_json::Value, "partners", "partners", Some("partners-old"), true
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn acl(site_id: i32, accessors: &[i32]) -> EncryptionKeyAcl {
        EncryptionKeyAcl {
            site_id,
            is_whitelist: true,
            accessors: accessors.iter().copied().collect(),
        }
    }

    #[test]
    fn file_names_and_backups() {
        assert_eq!(ClientKeys::data_file().to_string(), "clients.json");
        assert_eq!(
            ClientKeys::backup_file().map(|f| f.to_string()),
            Some("clients-old.json".to_string())
        );
        assert!(Keysets::backup_file().is_none());
        assert!(ServiceLinks::backup_file().is_none());
        assert!(OperatorKeys::LEGACY);
        assert!(!Sites::LEGACY);
    }

    #[test]
    fn map_serializes_values_in_key_order() {
        let acls = BTreeMap::from([(6, acl(6, &[1])), (5, acl(5, &[2, 3]))]);
        let json: serde_json::Value =
            serde_json::from_str(&KeyAcls::serialize(&acls).unwrap()).unwrap();
        assert_eq!(
            json,
            json!([
                {"site_id": 5, "whitelist": [2, 3]},
                {"site_id": 6, "whitelist": [1]}
            ])
        );
    }

    #[test]
    fn map_round_trip_rekeys_items() {
        let acls = BTreeMap::from([(5, acl(5, &[2])), (9, acl(9, &[]))]);
        let content = KeyAcls::serialize(&acls).unwrap();
        assert_eq!(KeyAcls::deserialize(content.as_bytes()).unwrap(), acls);
    }

    #[test]
    fn list_round_trip_preserves_order() {
        let sites = vec![
            Site {
                id: 9,
                name: "b".to_string(),
                enabled: true,
                types: BTreeSet::new(),
                domain_names: BTreeSet::from(["b.com".to_string()]),
                app_names: BTreeSet::new(),
                visible: true,
                created: 1,
            },
            Site {
                id: 3,
                name: "a".to_string(),
                enabled: false,
                types: BTreeSet::new(),
                domain_names: BTreeSet::new(),
                app_names: BTreeSet::new(),
                visible: false,
                created: 2,
            },
        ];
        let content = Sites::serialize(&sites).unwrap();
        assert_eq!(Sites::deserialize(content.as_bytes()).unwrap(), sites);
    }

    #[test]
    fn partners_are_kept_verbatim() {
        let partners = vec![json!({"name": "p1", "url": "https://example.com", "retry_count": 3})];
        let content = Partners::serialize(&partners).unwrap();
        assert_eq!(Partners::deserialize(content.as_bytes()).unwrap(), partners);
    }

    #[test]
    fn same_content_ignores_order() {
        let a = vec![json!(1), json!(2)];
        let b = vec![json!(2), json!(1)];
        assert!(Partners::same_content(&a, &b));
        assert!(!Partners::same_content(&a, &vec![json!(1), json!(3)]));
    }
}
