// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Framework adapters and the registry that resolves them.
//!
//! An adapter knows how to write one framework's native model object into a
//! directory and read it back. Adapters are registered once at start-up; the
//! built registry is immutable and shared behind an `Arc`.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::manifest::Manifest;
use super::requirement::Environment;
use crate::error::StoreError;

/// Errors returned by adapter implementations.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid model data: {0}")]
    InvalidData(String),
}

/// Adapter-specific options recorded in the manifest.
pub type AdapterOptions = Map<String, Value>;

/// Type-erased live model returned by [`DynAdapter::load`].
pub type AnyModel = Box<dyn Any + Send + Sync>;

/// Serialization adapter for one ML framework.
#[async_trait]
pub trait ModelAdapter: Send + Sync + 'static {
    /// Native model type this adapter saves and loads.
    type Model: Send + Sync + 'static;

    /// Stable identifier recorded in manifests (e.g. `"entity_ruler"`).
    fn id(&self) -> &str;

    /// Packages this adapter makes available to the environment.
    fn provides(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Requirements a saved `model` needs at load time.
    fn list_requirements(&self, model: &Self::Model) -> Vec<String>;

    /// Write `model` into `target_dir`, which exists and is empty.
    async fn save(
        &self,
        model: &Self::Model,
        target_dir: &Path,
    ) -> Result<AdapterOptions, AdapterError>;

    /// Read a model back from `dir`.
    async fn load(&self, dir: &Path, manifest: &Manifest) -> Result<Self::Model, AdapterError>;
}

/// Object-safe view of a [`ModelAdapter`], as stored in the registry.
#[async_trait]
pub trait DynAdapter: Send + Sync {
    fn id(&self) -> &str;

    fn provides(&self) -> Vec<(String, String)>;

    /// Rust type name of the native model.
    fn model_type(&self) -> &'static str;

    fn list_requirements(&self, model: &(dyn Any + Send + Sync)) -> Result<Vec<String>, StoreError>;

    async fn save(
        &self,
        model: &(dyn Any + Send + Sync),
        target_dir: &Path,
    ) -> Result<AdapterOptions, StoreError>;

    async fn load(&self, dir: &Path, manifest: &Manifest) -> Result<AnyModel, StoreError>;
}

struct Erased<A>(A);

impl<A: ModelAdapter> Erased<A> {
    fn downcast<'m>(&self, model: &'m (dyn Any + Send + Sync)) -> Result<&'m A::Model, StoreError> {
        model.downcast_ref::<A::Model>().ok_or_else(|| StoreError::ModelTypeMismatch {
            adapter_id: self.0.id().to_string(),
            expected: type_name::<A::Model>(),
        })
    }

    fn wrap(&self, source: AdapterError) -> StoreError {
        StoreError::Adapter { adapter_id: self.0.id().to_string(), source }
    }
}

#[async_trait]
impl<A: ModelAdapter> DynAdapter for Erased<A> {
    fn id(&self) -> &str {
        self.0.id()
    }

    fn provides(&self) -> Vec<(String, String)> {
        self.0.provides()
    }

    fn model_type(&self) -> &'static str {
        type_name::<A::Model>()
    }

    fn list_requirements(&self, model: &(dyn Any + Send + Sync)) -> Result<Vec<String>, StoreError> {
        Ok(self.0.list_requirements(self.downcast(model)?))
    }

    async fn save(
        &self,
        model: &(dyn Any + Send + Sync),
        target_dir: &Path,
    ) -> Result<AdapterOptions, StoreError> {
        let model = self.downcast(model)?;
        self.0.save(model, target_dir).await.map_err(|e| self.wrap(e))
    }

    async fn load(&self, dir: &Path, manifest: &Manifest) -> Result<AnyModel, StoreError> {
        let model = self.0.load(dir, manifest).await.map_err(|e| self.wrap(e))?;
        Ok(Box::new(model))
    }
}

/// Immutable map of adapter id to adapter, plus the package environment.
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn DynAdapter>>,
    environment: Environment,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("environment", &self.environment)
            .finish()
    }
}

impl AdapterRegistry {
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Registry with no adapters and an empty environment.
    pub fn empty() -> Self {
        Self { adapters: BTreeMap::new(), environment: Environment::new() }
    }

    /// Look up an adapter by id.
    pub fn resolve(&self, adapter_id: &str) -> Result<Arc<dyn DynAdapter>, StoreError> {
        self.adapters
            .get(adapter_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAdapter(adapter_id.to_string()))
    }

    pub fn contains(&self, adapter_id: &str) -> bool {
        self.adapters.contains_key(adapter_id)
    }

    pub fn adapter_ids(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Check every requirement declared by `manifest` against the environment.
    ///
    /// All unmet requirements are reported together.
    pub fn check_requirements(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let requirements = manifest.all_requirements();
        let unmet = self.environment.unmet(&requirements);
        if unmet.is_empty() {
            return Ok(());
        }
        Err(StoreError::Dependency {
            tag: format!("{}:{}", manifest.name, manifest.version),
            unmet,
        })
    }
}

/// Builder for [`AdapterRegistry`].
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    adapters: BTreeMap<String, Arc<dyn DynAdapter>>,
    environment: Environment,
}

impl AdapterRegistryBuilder {
    /// Register an adapter. Packages it provides join the environment.
    pub fn register<A: ModelAdapter>(mut self, adapter: A) -> Result<Self, StoreError> {
        let id = adapter.id().to_string();
        if id.is_empty() {
            return Err(StoreError::UnknownAdapter("adapter id cannot be empty".into()));
        }
        if self.adapters.contains_key(&id) {
            return Err(StoreError::Conflict(format!("adapter {}", id)));
        }
        for (name, version) in adapter.provides() {
            self.environment.insert(&name, &version)?;
        }
        self.adapters.insert(id, Arc::new(Erased(adapter)));
        Ok(self)
    }

    /// Declare a package available in the current environment.
    pub fn package(mut self, name: &str, version: &str) -> Result<Self, StoreError> {
        self.environment.insert(name, version)?;
        Ok(self)
    }

    pub fn packages<I, N, V>(mut self, packages: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, version) in packages {
            self.environment.insert(name.as_ref(), version.as_ref())?;
        }
        Ok(self)
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry { adapters: self.adapters, environment: self.environment }
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<AdapterRegistry>> = OnceLock::new();

/// Install the process-wide registry. May be called once.
pub fn install_global(registry: AdapterRegistry) -> Result<Arc<AdapterRegistry>, StoreError> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(registry.clone())
        .map_err(|_| StoreError::Conflict("global adapter registry".into()))?;
    tracing::info!(adapters = ?registry.adapter_ids(), "adapter registry installed");
    Ok(registry)
}

/// The process-wide registry, if installed.
pub fn global() -> Option<Arc<AdapterRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}
