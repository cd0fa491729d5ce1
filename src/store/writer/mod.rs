// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Store Writers
//!
//! Every write follows the same protocol:
//!
//! 1. Decide whether this is the first write for the scope.
//! 2. Resolve the content location (new on first write, recorded otherwise).
//! 3. Stamp `version` and `generated`, merge caller fields.
//! 4. Back up the previous content when configured.
//! 5. Upload the content, then the metadata.
//! 6. Notify listeners so cached readers reload.
//!
//! Writers are composed rather than specialised: [`ScopedStoreWriter`] and
//! [`LegacyStoreWriter`] implement [`DocumentWriter`] over raw content, the
//! [`EncryptingWriter`] decorator wraps any of them, and
//! [`EntityStoreWriter`] turns a typed collection into content.
//!
//! The protocol is last-writer-wins: nothing checks that the stored version
//! is still the one a caller read. Callers serialise writes to the same data
//! type and scope with their own lock.

pub mod encrypted;
pub mod entity;
pub mod legacy;
pub mod scoped;

use std::sync::Arc;

pub use encrypted::{decrypt_envelope, EncryptedEnvelope, EncryptingWriter, EncryptionKeyProvider};
pub use entity::{EntityStore, EntityStoreWriter};
pub use legacy::LegacyStoreWriter;
pub use scoped::ScopedStoreWriter;

use super::metadata::{AdditionalFields, Metadata};
use super::scope::StoreScope;
use crate::error::StoreResult;
use crate::storage::CloudPath;

/// Writes serialized content plus its metadata document.
pub trait DocumentWriter: Send + Sync {
    /// Write `content` and return the metadata that was stored with it.
    fn upload(&self, content: &str, extra: Option<&AdditionalFields>) -> StoreResult<Metadata>;

    /// Bump the stored metadata version without touching content.
    ///
    /// Does nothing when no metadata exists yet.
    fn rewrite_meta(&self) -> StoreResult<()>;

    fn data_type(&self) -> &str;

    fn scope(&self) -> &StoreScope;
}

impl<W: DocumentWriter + ?Sized> DocumentWriter for Arc<W> {
    fn upload(&self, content: &str, extra: Option<&AdditionalFields>) -> StoreResult<Metadata> {
        (**self).upload(content, extra)
    }

    fn rewrite_meta(&self) -> StoreResult<()> {
        (**self).rewrite_meta()
    }

    fn data_type(&self) -> &str {
        (**self).data_type()
    }

    fn scope(&self) -> &StoreScope {
        (**self).scope()
    }
}

/// Published after a metadata document has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub data_type: String,
    pub metadata_path: CloudPath,
    pub version: i64,
}

/// Receives write notifications, typically to refresh a cached view.
pub trait StoreListener: Send + Sync {
    /// Errors are returned from the `upload` that triggered the event.
    fn on_write(&self, event: &WriteEvent) -> StoreResult<()>;
}

/// Listener list shared by the writer implementations.
#[derive(Clone, Default)]
pub(crate) struct Listeners(Vec<Arc<dyn StoreListener>>);

impl Listeners {
    pub(crate) fn push(&mut self, listener: Arc<dyn StoreListener>) {
        self.0.push(listener);
    }

    pub(crate) fn notify(&self, event: &WriteEvent) -> StoreResult<()> {
        self.0.iter().try_for_each(|listener| listener.on_write(event))
    }
}
