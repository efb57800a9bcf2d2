// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tag resolution against the on-disk store layout.
//!
//! The resolver keeps no index: every lookup scans `<home>/<name>/` and reads
//! the committed manifests it finds. A version directory without a manifest
//! is a save in progress (or an abandoned one) and does not exist as far as
//! readers are concerned.

use std::path::{Path, PathBuf};

use futures::future::join_all;

use super::manifest::{Manifest, MANIFEST_FILE};
use super::tag::{Tag, TagRef};
use crate::error::StoreError;

/// Resolves tag references to committed manifests.
#[derive(Debug, Clone)]
pub struct TagResolver {
    home: PathBuf,
}

impl TagResolver {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Directory holding every version of `name`.
    pub fn name_dir(&self, name: &str) -> PathBuf {
        self.home.join(name)
    }

    /// Directory of one artifact.
    pub fn artifact_dir(&self, tag: &Tag) -> PathBuf {
        self.home.join(tag.name()).join(tag.version())
    }

    /// Resolve a reference to a committed tag and its manifest.
    ///
    /// `name` alone resolves to the artifact with the newest `created_at`;
    /// identical timestamps are broken by the greater version string, so the
    /// answer is always unique.
    pub async fn resolve(&self, tag_ref: &TagRef) -> Result<(Tag, Manifest), StoreError> {
        match tag_ref.version() {
            Some(version) => {
                let tag = Tag::new(tag_ref.name(), version)?;
                let manifest = self.read_committed(&tag).await?;
                Ok((tag, manifest))
            }
            None => {
                let manifest = self
                    .versions(tag_ref.name())
                    .await?
                    .pop()
                    .ok_or_else(|| StoreError::NotFound(tag_ref.name().to_string()))?;
                Ok((manifest.tag()?, manifest))
            }
        }
    }

    /// Read the manifest of an explicit tag.
    async fn read_committed(&self, tag: &Tag) -> Result<Manifest, StoreError> {
        let path = self.artifact_dir(tag).join(MANIFEST_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(tag.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let manifest = Manifest::from_json(&content)?;
        check_identity(&manifest, tag.name(), tag.version())?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// All committed manifests for `name`, oldest first.
    ///
    /// Unreadable manifests are skipped with a warning.
    pub async fn versions(&self, name: &str) -> Result<Vec<Manifest>, StoreError> {
        let dir = self.name_dir(name);
        let version_dirs = match list_subdirs(&dir).await {
            Ok(dirs) => dirs,
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e),
        };

        let reads = version_dirs.into_iter().map(|(version, path)| async move {
            read_scanned(name, &version, &path.join(MANIFEST_FILE)).await
        });
        let mut manifests: Vec<Manifest> = join_all(reads).await.into_iter().flatten().collect();

        manifests.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.version.cmp(&b.version))
        });
        Ok(manifests)
    }

    /// Names with at least one entry directory in the store.
    pub async fn names(&self) -> Result<Vec<String>, StoreError> {
        match list_subdirs(&self.home).await {
            Ok(dirs) => Ok(dirs.into_iter().map(|(name, _)| name).collect()),
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

fn check_identity(manifest: &Manifest, name: &str, version: &str) -> Result<(), StoreError> {
    if manifest.name != name || manifest.version != version {
        return Err(StoreError::ManifestInvalid(format!(
            "manifest describes {}:{} but is stored at {}:{}",
            manifest.name, manifest.version, name, version
        )));
    }
    Ok(())
}

/// Read a manifest found while scanning. `None` if pending or unreadable.
async fn read_scanned(name: &str, version: &str, path: &Path) -> Option<Manifest> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
            return None;
        }
    };
    let parsed = Manifest::from_json(&content).and_then(|m| {
        check_identity(&m, name, version)?;
        m.validate()?;
        Ok(m)
    });
    match parsed {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping corrupt manifest");
            None
        }
    }
}

/// Visible subdirectories of `dir` as (file name, path), sorted by name.
async fn list_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| StoreError::io(dir, e))?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(dir, e))? {
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            dirs.push((file_name, entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::manifest::{ArtifactKind, MANIFEST_SCHEMA_VERSION};
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn write_manifest(home: &Path, name: &str, version: &str, created_at: DateTime<Utc>) {
        let dir = home.join(name).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            name: name.into(),
            version: version.into(),
            kind: ArtifactKind::Model,
            adapter_id: Some("entity_ruler".into()),
            source: None,
            created_at,
            options: Default::default(),
            requirements: vec![],
            digest: None,
            extra: Default::default(),
        };
        std::fs::write(dir.join(MANIFEST_FILE), manifest.to_json().unwrap()).unwrap();
    }

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, secs).unwrap()
    }

    #[tokio::test]
    async fn test_latest_uses_created_at_not_version_order() {
        let home = TempDir::new().unwrap();
        // Version strings sort opposite to creation time here.
        write_manifest(home.path(), "ner", "zzz", at(1));
        write_manifest(home.path(), "ner", "aaa", at(5));
        write_manifest(home.path(), "ner", "mmm", at(3));

        let resolver = TagResolver::new(home.path());
        let (tag, _) = resolver.resolve(&TagRef::parse("ner").unwrap()).await.unwrap();
        assert_eq!(tag.version(), "aaa");
    }

    #[tokio::test]
    async fn test_latest_tie_breaks_on_version() {
        let home = TempDir::new().unwrap();
        write_manifest(home.path(), "ner", "v1", at(1));
        write_manifest(home.path(), "ner", "v2", at(1));

        let resolver = TagResolver::new(home.path());
        let (tag, _) = resolver.resolve(&TagRef::parse("ner:latest").unwrap()).await.unwrap();
        assert_eq!(tag.version(), "v2");
    }

    #[tokio::test]
    async fn test_pending_directory_is_invisible() {
        let home = TempDir::new().unwrap();
        write_manifest(home.path(), "ner", "v1", at(1));
        std::fs::create_dir_all(home.path().join("ner/v9")).unwrap();

        let resolver = TagResolver::new(home.path());
        let (tag, _) = resolver.resolve(&TagRef::parse("ner").unwrap()).await.unwrap();
        assert_eq!(tag.version(), "v1");

        let err = resolver.resolve(&TagRef::parse("ner:v9").unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_skipped_in_scan() {
        let home = TempDir::new().unwrap();
        write_manifest(home.path(), "ner", "v1", at(1));
        std::fs::create_dir_all(home.path().join("ner/v2")).unwrap();
        std::fs::write(home.path().join("ner/v2").join(MANIFEST_FILE), "{not json").unwrap();

        let resolver = TagResolver::new(home.path());
        assert_eq!(resolver.versions("ner").await.unwrap().len(), 1);

        let err = resolver.resolve(&TagRef::parse("ner:v2").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::ManifestInvalid(_)));
    }

    #[tokio::test]
    async fn test_manifest_identity_must_match_location() {
        let home = TempDir::new().unwrap();
        write_manifest(home.path(), "ner", "v1", at(1));
        std::fs::rename(home.path().join("ner/v1"), home.path().join("ner/v7")).unwrap();

        let resolver = TagResolver::new(home.path());
        let err = resolver.resolve(&TagRef::parse("ner:v7").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::ManifestInvalid(_)));
    }

    #[tokio::test]
    async fn test_unknown_name_not_found() {
        let home = TempDir::new().unwrap();
        let resolver = TagResolver::new(home.path());
        let err = resolver.resolve(&TagRef::parse("missing").unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(resolver.names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_with_only_pending_dirs_not_found() {
        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join("ner/v1")).unwrap();
        let resolver = TagResolver::new(home.path());
        let err = resolver.resolve(&TagRef::parse("ner").unwrap()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
