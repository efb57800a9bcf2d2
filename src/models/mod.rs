// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model artifact management for GG-STORE.
//!
//! Handles tag parsing and resolution, manifest parsing, adapter dispatch,
//! requirement checks, and the on-disk artifact store.

pub mod adapter;
pub mod digest;
pub mod manifest;
pub mod requirement;
pub mod tag;

mod resolver;
mod store;

pub use adapter::{
    AdapterError, AdapterOptions, AdapterRegistry, AdapterRegistryBuilder, AnyModel, DynAdapter,
    ModelAdapter,
};
pub use digest::ContentDigest;
pub use manifest::{ArtifactKind, Manifest, MANIFEST_FILE, MANIFEST_SCHEMA_VERSION};
pub use requirement::{Environment, PackageVersion, Requirement};
pub use resolver::TagResolver;
pub use store::{ModelStore, SaveOptions};
pub use tag::{Tag, TagRef};
