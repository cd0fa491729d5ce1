// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin Config Store - Versioned Configuration Documents in Object Storage
//!
//! This crate writes the configuration an identity-key-management control
//! plane publishes: sites, client and operator keys, encryption keys, ACLs,
//! keysets, services, salts and the like. Every data type is a JSON (or CSV)
//! content file plus a versioned metadata document that readers poll.
//!
//! ## Modules
//!
//! - `config` - Environment and JSON configuration
//! - `crypto` - AES-256-GCM payload encryption
//! - `error` - Error type shared by every layer
//! - `logging` - Tracing subscriber setup
//! - `models` - Entity types and their wire format
//! - `state` - Wiring from configuration to concrete stores
//! - `storage` - Object storage ports and backends
//! - `store` - Metadata-versioned write pipeline and cached readers

pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use state::StoreState;
