// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Artifact manifest parsing and validation for GG-STORE.
//!
//! Every committed artifact directory holds a `manifest.json` describing its
//! tag, kind, adapter and declared requirements. Manifests are plain JSON so
//! they can be inspected and edited by hand; keys this version does not know
//! about are carried through unchanged.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::digest::ContentDigest;
use super::tag::{self, Tag};
use crate::error::StoreError;

/// Manifest file name inside each artifact directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Newest manifest schema this build understands.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Option key holding requirements added after save.
pub const ADDITIONAL_REQUIREMENTS_KEY: &str = "additional_requirements";

fn default_schema_version() -> u32 {
    MANIFEST_SCHEMA_VERSION
}

/// What an artifact can be loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// A serialized model, loadable into a live object through its adapter.
    Model,
    /// A project or template bundle, consumed as a raw directory.
    Project,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::Project => f.write_str("project"),
        }
    }
}

/// Metadata for one stored artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub version: String,
    pub kind: ArtifactKind,
    /// Adapter that wrote the payload. Present only for models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_id: Option<String>,
    /// Where a project bundle was imported from. Present only for projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<ContentDigest>,
    /// Unknown keys, preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Manifest {
    /// Parse a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::ManifestInvalid(format!("invalid manifest JSON: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The tag this manifest describes.
    pub fn tag(&self) -> Result<Tag, StoreError> {
        Tag::new(&self.name, &self.version)
    }

    /// Validate manifest fields for correctness.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.schema_version == 0 || self.schema_version > MANIFEST_SCHEMA_VERSION {
            return Err(StoreError::ManifestInvalid(format!(
                "unsupported schema_version {} (max {})",
                self.schema_version, MANIFEST_SCHEMA_VERSION
            )));
        }
        tag::validate_name(&self.name)
            .map_err(|e| StoreError::ManifestInvalid(e.to_string()))?;
        tag::validate_version(&self.version)
            .map_err(|e| StoreError::ManifestInvalid(e.to_string()))?;

        match self.kind {
            ArtifactKind::Model => {
                if self.adapter_id.as_deref().map_or(true, str::is_empty) {
                    return Err(StoreError::ManifestInvalid(
                        "model manifest requires adapter_id".into(),
                    ));
                }
            }
            ArtifactKind::Project => {
                if self.adapter_id.is_some() {
                    return Err(StoreError::ManifestInvalid(
                        "project manifest cannot have adapter_id".into(),
                    ));
                }
                if self.source.as_deref().map_or(true, str::is_empty) {
                    return Err(StoreError::ManifestInvalid(
                        "project manifest requires source".into(),
                    ));
                }
            }
        }

        if let Some(digest) = &self.digest {
            digest.validate()?;
        }
        if let Some(value) = self.options.get(ADDITIONAL_REQUIREMENTS_KEY) {
            let ok = value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string));
            if !ok {
                return Err(StoreError::ManifestInvalid(format!(
                    "options.{} must be a list of strings",
                    ADDITIONAL_REQUIREMENTS_KEY
                )));
            }
        }
        Ok(())
    }

    /// Requirements added through `options.additional_requirements`.
    pub fn additional_requirements(&self) -> Vec<String> {
        self.options
            .get(ADDITIONAL_REQUIREMENTS_KEY)
            .and_then(Value::as_array)
            .map(|items| {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            })
            .unwrap_or_default()
    }

    /// Declared plus additional requirements, in order, without duplicates.
    pub fn all_requirements(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::with_capacity(self.requirements.len());
        for req in self.requirements.iter().cloned().chain(self.additional_requirements()) {
            if !all.contains(&req) {
                all.push(req);
            }
        }
        all
    }
}
