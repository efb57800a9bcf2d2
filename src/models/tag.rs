// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Artifact tags: `name:version` identifiers and caller-supplied references.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::StoreError;

/// Version keyword that always resolves to the newest committed artifact.
pub const LATEST: &str = "latest";

pub const MAX_NAME_LEN: usize = 63;
pub const MAX_VERSION_LEN: usize = 128;

static TAG_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-._a-z0-9]*[a-z0-9])?$").expect("static regex")
});

fn invalid(input: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidTag { input: input.to_string(), reason: reason.into() }
}

/// Validate an artifact name.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(invalid(name, "name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(name, format!("name exceeds {} characters", MAX_NAME_LEN)));
    }
    if !TAG_COMPONENT.is_match(name) {
        return Err(invalid(
            name,
            "name must be lowercase alphanumeric, '-', '_' or '.', starting and ending alphanumeric",
        ));
    }
    Ok(())
}

/// Validate an explicit artifact version.
pub fn validate_version(version: &str) -> Result<(), StoreError> {
    if version.is_empty() {
        return Err(invalid(version, "version cannot be empty"));
    }
    if version.len() > MAX_VERSION_LEN {
        return Err(invalid(version, format!("version exceeds {} characters", MAX_VERSION_LEN)));
    }
    if version == LATEST {
        return Err(invalid(version, "'latest' is reserved"));
    }
    if !TAG_COMPONENT.is_match(version) {
        return Err(invalid(
            version,
            "version must be lowercase alphanumeric, '-', '_' or '.', starting and ending alphanumeric",
        ));
    }
    Ok(())
}

/// Generate a fresh version for an artifact created at `created_at`.
///
/// Versions sort lexically by creation time; the random suffix keeps
/// concurrent saves within the same microsecond distinct.
pub fn generate_version(created_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", created_at.format("%Y%m%d%H%M%S%6f"), &suffix[..8])
}

/// Unique identifier of one committed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    name: String,
    version: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let version = version.into();
        validate_name(&name)?;
        validate_version(&version)?;
        Ok(Self { name, version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

impl FromStr for Tag {
    type Err = StoreError;

    /// Parse a fully-qualified `name:version` tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((name, version)) => Tag::new(name, version),
            None => Err(invalid(s, "expected name:version")),
        }
    }
}

/// A caller's reference to an artifact: a name plus an optional version.
///
/// `version == None` means "latest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    name: String,
    version: Option<String>,
}

impl TagRef {
    pub fn latest(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, version: None })
    }

    /// Parse `name`, `name:latest` or `name:version`.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let input = input.trim();
        let (name, version) = match input.split_once(':') {
            Some((name, version)) => (name, Some(version)),
            None => (input, None),
        };
        validate_name(name)?;
        let version = match version {
            None | Some(LATEST) => None,
            Some(v) if v.contains(':') => return Err(invalid(input, "too many ':' separators")),
            Some(v) => {
                validate_version(v)?;
                Some(v.to_string())
            }
        };
        Ok(Self { name: name.to_string(), version })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn is_latest(&self) -> bool {
        self.version.is_none()
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{}", self.name, v),
            None => write!(f, "{}:{}", self.name, LATEST),
        }
    }
}

impl TryFrom<&str> for TagRef {
    type Error = StoreError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        TagRef::parse(value)
    }
}

impl TryFrom<String> for TagRef {
    type Error = StoreError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        TagRef::parse(&value)
    }
}

impl TryFrom<&String> for TagRef {
    type Error = StoreError;
    fn try_from(value: &String) -> Result<Self, Self::Error> {
        TagRef::parse(value)
    }
}

impl TryFrom<&Tag> for TagRef {
    type Error = StoreError;
    fn try_from(tag: &Tag) -> Result<Self, Self::Error> {
        Ok(Self { name: tag.name.clone(), version: Some(tag.version.clone()) })
    }
}

impl TryFrom<Tag> for TagRef {
    type Error = StoreError;
    fn try_from(tag: Tag) -> Result<Self, Self::Error> {
        Ok(Self { name: tag.name, version: Some(tag.version) })
    }
}

impl TryFrom<&TagRef> for TagRef {
    type Error = StoreError;
    fn try_from(r: &TagRef) -> Result<Self, Self::Error> {
        Ok(r.clone())
    }
}
