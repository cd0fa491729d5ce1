// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Versioned Document Store
//!
//! Each data type is stored as a content file plus a metadata document that
//! points at it:
//!
//! ```text
//! clients/
//! ├── metadata.json                 # global scope
//! ├── clients.json
//! ├── clients.json.bak              # latest backup
//! ├── clients.json.<epoch>.bak      # dated backup
//! ├── site/
//! │   └── 5/
//! │       ├── metadata.json         # site scope
//! │       └── clients.json
//! └── encrypted/
//!     └── 5_private/
//!         ├── metadata.json         # encrypted scope
//!         └── clients.json          # envelope
//! ```
//!
//! Metadata documents carry `version`, `generated` (epoch seconds) and a
//! `<data type>.location` entry, plus any caller fields:
//!
//! ```json
//! {
//!   "version": 1700000000123,
//!   "generated": 1700000000,
//!   "client_keys": { "location": "clients/clients.json" }
//! }
//! ```
//!
//! Writers live in [`writer`], cached readers in [`reader`], per-entity
//! codecs in [`entities`], the fan-out writer in [`multi_scope`] and the
//! salt snapshot pipeline in [`salt`].

pub mod clock;
pub mod entities;
pub mod file_manager;
pub mod metadata;
pub mod multi_scope;
pub mod reader;
pub mod salt;
pub mod scope;
pub mod version;
pub mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entities::EntityCodec;
pub use file_manager::FileManager;
pub use metadata::{AdditionalFields, Metadata};
pub use multi_scope::{
    are_collections_equal, are_maps_equal, MultiScopeStoreWriter, SiteStoreFactory, StoreFactory,
};
pub use reader::StoreReader;
pub use salt::{SaltSnapshot, SaltStoreReader, SaltStoreWriter, SnapshotLayout};
pub use scope::StoreScope;
pub use version::{
    ConsecutiveVersionGenerator, EpochVersionGenerator, MetadataSource, VersionGenerator,
};
pub use writer::{
    DocumentWriter, EncryptingWriter, EncryptionKeyProvider, EntityStore, EntityStoreWriter,
    LegacyStoreWriter, ScopedStoreWriter, StoreListener, WriteEvent,
};
