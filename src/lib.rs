//! GG-Store
//!
//! A tag-indexed, append-only store for trained model artifacts and project
//! templates. Each saved artifact gets an immutable `name:version` tag and a
//! directory holding the framework's native files plus a JSON manifest.
//!
//! # Design Principles
//!
//! - **Append-only**: tags are never reused or overwritten
//! - **Atomic**: the manifest is published last by rename; partial saves are invisible
//! - **Pluggable**: framework serialization lives behind [`models::ModelAdapter`]
//! - **Lazy checks**: requirements are verified against the environment at load time
//!
//! # Layout
//!
//! ```text
//! <home>/<name>/<version>/manifest.json
//! <home>/<name>/<version>/<adapter or project files>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;

pub use adapters::builtin_registry;
pub use config::StoreConfig;
pub use error::{Result, StoreError, UnmetReason, UnmetRequirement};
pub use models::{
    AdapterRegistry, ArtifactKind, Manifest, ModelAdapter, ModelStore, SaveOptions, Tag, TagRef,
};
