// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tag-indexed, append-only artifact store.
//!
//! Layout: `<home>/<name>/<version>/` holds the payload files written by an
//! adapter (or copied from a project directory) plus `manifest.json`. The
//! manifest is always written last, through a temp file and an atomic
//! rename, so a reader either sees a complete artifact or none at all.

use std::any::type_name;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::Instrument;

use super::adapter::{self, AdapterRegistry, AnyModel};
use super::digest::{self, ContentDigest, MANIFEST_TMP_PREFIX};
use super::manifest::{ArtifactKind, Manifest, MANIFEST_FILE, MANIFEST_SCHEMA_VERSION};
use super::requirement::Requirement;
use super::resolver::TagResolver;
use super::tag::{self, Tag, TagRef};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::telemetry::{self, SpanExt, StoreSpan};

/// Caller-supplied options for a save.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Recorded under `options` in the manifest; override adapter options.
    pub options: Map<String, Value>,
    /// Requirements declared in addition to those the adapter reports.
    pub requirements: Vec<String>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }
}

/// Content-addressed model artifact store.
#[derive(Debug, Clone)]
pub struct ModelStore {
    resolver: TagResolver,
    registry: Arc<AdapterRegistry>,
    verify_on_load: bool,
}

impl ModelStore {
    pub fn new(home: impl Into<PathBuf>, registry: Arc<AdapterRegistry>) -> Self {
        Self { resolver: TagResolver::new(home), registry, verify_on_load: false }
    }

    /// Store rooted at `config.home` using the given registry.
    pub fn from_config(config: &StoreConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self::new(&config.home, registry).with_verify_on_load(config.verify_on_load)
    }

    /// Store backed by the process-wide registry.
    pub fn with_global_registry(home: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let registry = adapter::global()
            .ok_or_else(|| StoreError::UnknownAdapter("no global adapter registry installed".into()))?;
        Ok(Self::new(home, registry))
    }

    /// Re-verify content digests on every `load`.
    pub fn with_verify_on_load(mut self, verify: bool) -> Self {
        self.verify_on_load = verify;
        self
    }

    pub fn home(&self) -> &Path {
        self.resolver.home()
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Directory of a committed artifact.
    pub fn path_of(&self, tag: &Tag) -> PathBuf {
        self.resolver.artifact_dir(tag)
    }

    /// Serialize `model` with adapter `adapter_id` and commit it under a new tag.
    pub async fn save<M>(
        &self,
        name: &str,
        model: &M,
        adapter_id: &str,
        options: SaveOptions,
    ) -> Result<Tag, StoreError>
    where
        M: Send + Sync + 'static,
    {
        instrumented("save", name, async {
            tag::validate_name(name)?;
            let adapter = self.registry.resolve(adapter_id)?;
            let mut requirements = adapter.list_requirements(model)?;
            requirements.extend(options.requirements);
            let requirements = dedup(requirements);
            validate_requirements(&requirements)?;

            let (tag, dir, created_at) = self.allocate(name).await?;
            let adapter_options = match adapter.save(model, &dir).await {
                Ok(opts) => opts,
                Err(e) => {
                    discard(&dir).await;
                    return Err(e);
                }
            };

            let mut merged = adapter_options;
            merged.extend(options.options);

            let manifest = Manifest {
                schema_version: MANIFEST_SCHEMA_VERSION,
                name: tag.name().to_string(),
                version: tag.version().to_string(),
                kind: ArtifactKind::Model,
                adapter_id: Some(adapter_id.to_string()),
                source: None,
                created_at,
                options: merged,
                requirements,
                digest: None,
                extra: Default::default(),
            };
            seal_and_commit(&dir, manifest).await?;
            tracing::info!(tag = %tag, adapter = adapter_id, "model saved");
            Ok(tag)
        })
        .await
    }

    /// Import a local project/template directory as a new artifact.
    pub async fn save_project(
        &self,
        name: &str,
        source_dir: &Path,
        options: SaveOptions,
    ) -> Result<Tag, StoreError> {
        instrumented("save_project", name, async {
            tag::validate_name(name)?;
            let is_dir = tokio::fs::metadata(source_dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                return Err(StoreError::NotFound(format!(
                    "project source {}",
                    source_dir.display()
                )));
            }
            // A copied manifest would make the directory look committed.
            let foreign = source_dir.join(MANIFEST_FILE);
            if tokio::fs::try_exists(&foreign).await.unwrap_or(false) {
                return Err(StoreError::Conflict(foreign.display().to_string()));
            }
            let requirements = dedup(options.requirements);
            validate_requirements(&requirements)?;

            let (tag, dir, created_at) = self.allocate(name).await?;
            if let Err(e) = ensure_outside(source_dir, &dir).await {
                discard(&dir).await;
                return Err(e);
            }
            if let Err(e) = digest::copy_tree(source_dir, &dir).await {
                discard(&dir).await;
                return Err(e);
            }

            let manifest = Manifest {
                schema_version: MANIFEST_SCHEMA_VERSION,
                name: tag.name().to_string(),
                version: tag.version().to_string(),
                kind: ArtifactKind::Project,
                adapter_id: None,
                source: Some(source_dir.display().to_string()),
                created_at,
                options: options.options,
                requirements,
                digest: None,
                extra: Default::default(),
            };
            seal_and_commit(&dir, manifest).await?;
            tracing::info!(tag = %tag, source = %source_dir.display(), "project imported");
            Ok(tag)
        })
        .await
    }

    /// Manifest of the artifact `tag` refers to.
    pub async fn get<T>(&self, tag: T) -> Result<Manifest, StoreError>
    where
        T: TryInto<TagRef, Error = StoreError>,
    {
        let tag_ref = tag.try_into()?;
        instrumented("get", &tag_ref.to_string(), async {
            let (_, manifest) = self.resolver.resolve(&tag_ref).await?;
            Ok(manifest)
        })
        .await
    }

    /// Load a model artifact as its native type `M`.
    pub async fn load<M, T>(&self, tag: T) -> Result<M, StoreError>
    where
        M: Send + Sync + 'static,
        T: TryInto<TagRef, Error = StoreError>,
    {
        let (model, adapter_id) = self.load_erased(tag.try_into()?).await?;
        model.downcast::<M>().map(|m| *m).map_err(|_| StoreError::ModelTypeMismatch {
            adapter_id,
            expected: type_name::<M>(),
        })
    }

    /// Load a model artifact as a type-erased handle.
    pub async fn load_dyn<T>(&self, tag: T) -> Result<AnyModel, StoreError>
    where
        T: TryInto<TagRef, Error = StoreError>,
    {
        let (model, _) = self.load_erased(tag.try_into()?).await?;
        Ok(model)
    }

    async fn load_erased(&self, tag_ref: TagRef) -> Result<(AnyModel, String), StoreError> {
        instrumented("load", &tag_ref.to_string(), async {
            let (tag, manifest) = self.resolver.resolve(&tag_ref).await?;
            expect_kind(&tag, &manifest, ArtifactKind::Model)?;

            let adapter_id = manifest.adapter_id.clone().ok_or_else(|| {
                StoreError::ManifestInvalid("model manifest requires adapter_id".into())
            })?;
            let adapter = self.registry.resolve(&adapter_id)?;
            self.registry.check_requirements(&manifest)?;

            let dir = self.path_of(&tag);
            if self.verify_on_load {
                verify_dir(&tag, &dir, &manifest).await?;
            }
            let model = adapter.load(&dir, &manifest).await?;
            tracing::debug!(tag = %tag, adapter = %adapter_id, "model loaded");
            Ok((model, adapter_id))
        })
        .await
    }

    /// Directory of a project artifact. Models are rejected.
    pub async fn load_project<T>(&self, tag: T) -> Result<PathBuf, StoreError>
    where
        T: TryInto<TagRef, Error = StoreError>,
    {
        let tag_ref = tag.try_into()?;
        instrumented("load_project", &tag_ref.to_string(), async {
            let (tag, manifest) = self.resolver.resolve(&tag_ref).await?;
            expect_kind(&tag, &manifest, ArtifactKind::Project)?;
            Ok(self.path_of(&tag))
        })
        .await
    }

    /// Committed artifacts, by name then newest first.
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<Manifest>, StoreError> {
        let names = match name {
            Some(name) => {
                tag::validate_name(name)?;
                vec![name.to_string()]
            }
            None => self.resolver.names().await?,
        };

        let mut all = Vec::new();
        for name in names {
            match self.resolver.versions(&name).await {
                Ok(mut versions) => {
                    versions.reverse();
                    all.extend(versions);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(all)
    }

    /// Recompute an artifact's digest and compare it with its manifest.
    pub async fn verify<T>(&self, tag: T) -> Result<ContentDigest, StoreError>
    where
        T: TryInto<TagRef, Error = StoreError>,
    {
        let tag_ref = tag.try_into()?;
        instrumented("verify", &tag_ref.to_string(), async {
            let (tag, manifest) = self.resolver.resolve(&tag_ref).await?;
            verify_dir(&tag, &self.path_of(&tag), &manifest).await
        })
        .await
    }

    /// Check an artifact's requirements against the environment without loading.
    pub async fn check_requirements<T>(&self, tag: T) -> Result<Manifest, StoreError>
    where
        T: TryInto<TagRef, Error = StoreError>,
    {
        let manifest = self.get(tag).await?;
        self.registry.check_requirements(&manifest)?;
        Ok(manifest)
    }

    /// Create a fresh, exclusively owned artifact directory.
    async fn allocate(&self, name: &str) -> Result<(Tag, PathBuf, chrono::DateTime<Utc>), StoreError> {
        let name_dir = self.resolver.name_dir(name);
        tokio::fs::create_dir_all(&name_dir)
            .await
            .map_err(|e| StoreError::io(&name_dir, e))?;

        let created_at = Utc::now();
        let tag = Tag::new(name, tag::generate_version(created_at))?;
        let dir = self.path_of(&tag);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => Ok((tag, dir, created_at)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(tag.to_string()))
            }
            Err(e) => Err(StoreError::io(&dir, e)),
        }
    }
}

/// Record the payload digest, then publish the manifest atomically.
///
/// On failure the artifact directory is removed.
async fn seal_and_commit(dir: &Path, mut manifest: Manifest) -> Result<(), StoreError> {
    let result = async {
        let digest = digest::compute(dir).await?;
        let bytes = digest.size_bytes;
        manifest.digest = Some(digest);
        manifest.validate()?;
        commit_manifest(dir, &manifest).await?;
        telemetry::record_bytes_written(bytes);
        Ok(())
    }
    .await;
    if result.is_err() {
        discard(dir).await;
    }
    result
}

/// Write the manifest to a temp file, then rename it into place.
async fn commit_manifest(dir: &Path, manifest: &Manifest) -> Result<(), StoreError> {
    let final_path = dir.join(MANIFEST_FILE);
    let tmp_path = dir.join(format!("{}{}.tmp", MANIFEST_TMP_PREFIX, uuid::Uuid::new_v4().simple()));
    let json = manifest.to_json()?;

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    let file = tokio::fs::File::open(&tmp_path)
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    file.sync_all().await.map_err(|e| StoreError::io(&tmp_path, e))?;

    if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(StoreError::Conflict(format!("{}:{}", manifest.name, manifest.version)));
    }
    tokio::fs::rename(&tmp_path, &final_path)
        .await
        .map_err(|e| StoreError::io(&final_path, e))
}

async fn verify_dir(tag: &Tag, dir: &Path, manifest: &Manifest) -> Result<ContentDigest, StoreError> {
    let expected = manifest
        .digest
        .as_ref()
        .ok_or_else(|| StoreError::ManifestInvalid(format!("{} has no recorded digest", tag)))?;
    let actual = digest::compute(dir).await?;
    if actual.value != expected.value {
        tracing::warn!(tag = %tag, expected = %expected.value, actual = %actual.value, "digest mismatch");
        return Err(StoreError::IntegrityMismatch {
            tag: tag.to_string(),
            expected: expected.value.clone(),
            actual: actual.value,
        });
    }
    Ok(actual)
}

fn expect_kind(tag: &Tag, manifest: &Manifest, expected: ArtifactKind) -> Result<(), StoreError> {
    if manifest.kind != expected {
        return Err(StoreError::InvalidKind {
            tag: tag.to_string(),
            expected,
            actual: manifest.kind,
        });
    }
    Ok(())
}

fn dedup(requirements: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(requirements.len());
    for r in requirements {
        if !out.contains(&r) {
            out.push(r);
        }
    }
    out
}

fn validate_requirements(requirements: &[String]) -> Result<(), StoreError> {
    for r in requirements {
        Requirement::parse(r)?;
    }
    Ok(())
}

/// Remove a half-written artifact directory. Failures are logged only.
/// Reject a project source that contains the artifact directory, which
/// would make the copy recurse into itself.
async fn ensure_outside(source_dir: &Path, dir: &Path) -> Result<(), StoreError> {
    let source = tokio::fs::canonicalize(source_dir)
        .await
        .map_err(|e| StoreError::io(source_dir, e))?;
    let target = tokio::fs::canonicalize(dir).await.map_err(|e| StoreError::io(dir, e))?;
    if target.starts_with(&source) {
        return Err(StoreError::InvalidSource {
            path: source_dir.to_path_buf(),
            reason: format!("contains the artifact directory {}", dir.display()),
        });
    }
    Ok(())
}

async fn discard(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        tracing::warn!(path = %dir.display(), error = %e, "failed to remove incomplete artifact");
    }
}

/// Run `op` inside a store span and record its outcome.
async fn instrumented<T, F>(operation: &'static str, tag: &str, op: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let span = StoreSpan::new(operation, tag);
    let start = Instant::now();
    let result = op.instrument(span.clone()).await;
    let elapsed = start.elapsed();

    span.record("latency_ms", elapsed.as_millis() as u64);
    span.record_result(&result);
    match &result {
        Ok(_) => telemetry::record_operation_success(operation, elapsed),
        Err(e) => telemetry::record_operation_failure(operation, e.kind_label(), elapsed),
    }
    result
}
