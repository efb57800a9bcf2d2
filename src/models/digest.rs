// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Content digests over artifact payload directories.
//!
//! The digest covers every regular file under an artifact directory except
//! the manifest itself and in-flight manifest temp files. Files are visited
//! in sorted relative-path order so the result does not depend on directory
//! listing order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::manifest::MANIFEST_FILE;
use crate::error::StoreError;

pub const DIGEST_ALGORITHM: &str = "sha256";

/// Prefix of manifest temp files written during commit.
pub(crate) const MANIFEST_TMP_PREFIX: &str = ".manifest-";

/// Digest recorded in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDigest {
    pub algorithm: String,
    /// Lowercase hex SHA-256.
    pub value: String,
    pub size_bytes: u64,
    pub file_count: u64,
}

impl ContentDigest {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.algorithm != DIGEST_ALGORITHM {
            return Err(StoreError::ManifestInvalid(format!(
                "unsupported digest algorithm {:?}",
                self.algorithm
            )));
        }
        if self.value.len() != 64 || !self.value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::ManifestInvalid(
                "digest value must be 64 hex characters".into(),
            ));
        }
        Ok(())
    }
}

fn is_excluded(relative: &str) -> bool {
    relative == MANIFEST_FILE
        || (!relative.contains('/') && relative.starts_with(MANIFEST_TMP_PREFIX))
}

/// Collect regular files under `root` as (relative path, absolute path).
///
/// Symlinks are not followed.
async fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries =
            tokio::fs::read_dir(&dir).await.map_err(|e| StoreError::io(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| StoreError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = relative_path(root, &path);
                files.push((relative, path));
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the content digest of an artifact directory.
pub async fn compute(root: &Path) -> Result<ContentDigest, StoreError> {
    let files = collect_files(root).await?;
    let mut hasher = Sha256::new();
    let mut size_bytes = 0u64;
    let mut file_count = 0u64;

    for (relative, path) in files {
        if is_excluded(&relative) {
            continue;
        }
        let bytes = tokio::fs::read(&path).await.map_err(|e| StoreError::io(&path, e))?;
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
        size_bytes += bytes.len() as u64;
        file_count += 1;
    }

    Ok(ContentDigest {
        algorithm: DIGEST_ALGORITHM.to_string(),
        value: hex::encode(hasher.finalize()),
        size_bytes,
        file_count,
    })
}

/// Recursively copy the regular files and directories of `src` into `dst`.
///
/// `dst` must already exist. Symlinks are skipped. Returns bytes copied.
pub async fn copy_tree(src: &Path, dst: &Path) -> Result<u64, StoreError> {
    let mut copied = 0u64;
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from_dir, to_dir)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&from_dir)
            .await
            .map_err(|e| StoreError::io(&from_dir, e))?;
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| StoreError::io(&from_dir, e))?
        {
            let from = entry.path();
            let to = to_dir.join(entry.file_name());
            let file_type = entry.file_type().await.map_err(|e| StoreError::io(&from, e))?;
            if file_type.is_dir() {
                tokio::fs::create_dir(&to).await.map_err(|e| StoreError::io(&to, e))?;
                pending.push((from, to));
            } else if file_type.is_file() {
                copied += tokio::fs::copy(&from, &to).await.map_err(|e| StoreError::io(&from, e))?;
            } else {
                tracing::warn!(path = %from.display(), "skipping non-regular file");
            }
        }
    }

    Ok(copied)
}
