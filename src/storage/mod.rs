// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Object Storage Module
//!
//! The store talks to object storage through two ports:
//!
//! - [`ObjectStorage`] lists, uploads and downloads objects by key
//! - [`FileStorage`] stages content locally before it is uploaded
//!
//! ## Backends
//!
//! - [`LocalFsObjectStorage`] keeps objects as files under a root directory,
//!   with [`TmpFileStorage`] staging into a temp directory
//! - [`MemoryObjectStorage`] keeps both objects and staged files in memory
//!
//! Keys are `/`-separated [`CloudPath`]s. Backends never interpret them
//! beyond mapping segments to directories.

pub mod local_fs;
pub mod memory;
pub mod paths;
pub mod ports;

pub use local_fs::{LocalFsObjectStorage, TmpFileStorage};
pub use memory::MemoryObjectStorage;
pub use paths::{CloudPath, FileName};
pub use ports::{FileStorage, ObjectStorage};
