// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Store error types for GG-STORE.
//!
//! All errors are fail-closed: a caller asking for the wrong kind of artifact,
//! or loading into an environment that cannot satisfy its requirements, gets a
//! typed error rather than a best-effort result.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::adapter::AdapterError;
use crate::models::manifest::ArtifactKind;

/// Convenience alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Why a single declared requirement could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmetReason {
    /// No package with this name is available.
    Missing,
    /// The package is available, but its version does not match.
    VersionMismatch { installed: String },
    /// The requirement string could not be parsed.
    Invalid(String),
}

/// One requirement that failed the environment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetRequirement {
    pub requirement: String,
    pub reason: UnmetReason,
}

impl fmt::Display for UnmetRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            UnmetReason::Missing => write!(f, "{} (not installed)", self.requirement),
            UnmetReason::VersionMismatch { installed } => {
                write!(f, "{} (installed: {})", self.requirement, installed)
            }
            UnmetReason::Invalid(msg) => write!(f, "{} (invalid: {})", self.requirement, msg),
        }
    }
}

fn join_unmet(unmet: &[UnmetRequirement]) -> String {
    unmet
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0} already exists")]
    Conflict(String),

    #[error("Artifact {tag} is a {actual}, not a {expected}")]
    InvalidKind {
        tag: String,
        expected: ArtifactKind,
        actual: ArtifactKind,
    },

    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("Missing dependencies for {tag}: {}", join_unmet(.unmet))]
    Dependency {
        tag: String,
        unmet: Vec<UnmetRequirement>,
    },

    #[error("Invalid tag {input:?}: {reason}")]
    InvalidTag { input: String, reason: String },

    #[error("Invalid requirement {input:?}: {reason}")]
    InvalidRequirement { input: String, reason: String },

    #[error("Invalid project source {}: {reason}", .path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("Adapter {adapter_id} expects a model of type {expected}")]
    ModelTypeMismatch {
        adapter_id: String,
        expected: &'static str,
    },

    #[error("Digest mismatch for {tag}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        tag: String,
        expected: String,
        actual: String,
    },

    #[error("Adapter {adapter_id} failed: {source}")]
    Adapter {
        adapter_id: String,
        #[source]
        source: AdapterError,
    },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Stable short label for metrics and structured logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidKind { .. } => "invalid_kind",
            Self::UnknownAdapter(_) => "unknown_adapter",
            Self::Dependency { .. } => "dependency",
            Self::InvalidTag { .. } => "invalid_tag",
            Self::InvalidRequirement { .. } => "invalid_requirement",
            Self::InvalidSource { .. } => "invalid_source",
            Self::ManifestInvalid(_) => "manifest_invalid",
            Self::ModelTypeMismatch { .. } => "model_type_mismatch",
            Self::IntegrityMismatch { .. } => "integrity_mismatch",
            Self::Adapter { .. } => "adapter",
            Self::Io { .. } => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the caller can fix this by changing the environment
    /// rather than the stored artifact.
    pub fn is_environmental(&self) -> bool {
        matches!(self, Self::Dependency { .. } | Self::UnknownAdapter(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_error_lists_every_requirement() {
        let err = StoreError::Dependency {
            tag: "ner:1".into(),
            unmet: vec![
                UnmetRequirement {
                    requirement: "spacy-transformers>=1.0.3,<1.1.0".into(),
                    reason: UnmetReason::Missing,
                },
                UnmetRequirement {
                    requirement: "torch==2.0".into(),
                    reason: UnmetReason::VersionMismatch { installed: "1.13.1".into() },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("spacy-transformers>=1.0.3,<1.1.0 (not installed)"));
        assert!(msg.contains("torch==2.0 (installed: 1.13.1)"));
        assert_eq!(err.kind_label(), "dependency");
        assert!(err.is_environmental());
    }

    #[test]
    fn test_invalid_kind_message() {
        let err = StoreError::InvalidKind {
            tag: "demo:abc".into(),
            expected: ArtifactKind::Project,
            actual: ArtifactKind::Model,
        };
        assert_eq!(err.to_string(), "Artifact demo:abc is a model, not a project");
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = StoreError::io("/tmp/x", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().contains("/tmp/x"));
        assert!(!err.is_not_found());
    }
}
