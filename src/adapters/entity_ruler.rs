// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Phrase-pattern named entity recognizer and its store adapter.
//!
//! The recognizer is deterministic: the same patterns always produce the same
//! entities for the same text, which makes it a convenient reference model
//! for save/load round trips.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::adapter::{AdapterError, AdapterOptions, ModelAdapter};
use crate::models::manifest::Manifest;

/// Adapter id recorded in manifests.
pub const ENTITY_RULER_ID: &str = "entity_ruler";

/// Package name the adapter provides and requires.
pub const ENTITY_RULER_PACKAGE: &str = "entity-ruler";

/// Serialization format version of `meta.json` / `patterns.json`.
pub const ENTITY_RULER_VERSION: &str = "1.0.0";

pub const META_FILE: &str = "meta.json";
pub const PATTERNS_FILE: &str = "patterns.json";

/// One phrase mapped to an entity label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPattern {
    pub label: String,
    pub phrase: String,
}

/// An entity found in a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Extracted entity text.
    pub text: String,
    /// Entity label (e.g., "ORG").
    pub label: String,
    /// Start byte offset in source text.
    pub start: usize,
    /// End byte offset in source text.
    pub end: usize,
}

/// Result of running the recognizer over a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doc {
    pub text: String,
    pub entities: Vec<Entity>,
}

/// Annotated training example: text plus `(start, end, label)` spans.
pub type TrainingExample<'a> = (&'a str, &'a [(usize, usize, &'a str)]);

/// Leftmost-longest phrase matcher over word boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRuler {
    lang: String,
    case_sensitive: bool,
    patterns: Vec<EntityPattern>,
}

impl EntityRuler {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into(), case_sensitive: true, patterns: Vec::new() }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn patterns(&self) -> &[EntityPattern] {
        &self.patterns
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|p| p.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Add a phrase pattern. Empty or duplicate phrases are ignored.
    pub fn add_pattern(&mut self, label: impl Into<String>, phrase: impl Into<String>) {
        let pattern = EntityPattern { label: label.into(), phrase: phrase.into() };
        if pattern.phrase.trim().is_empty() || self.patterns.contains(&pattern) {
            return;
        }
        self.patterns.push(pattern);
    }

    /// Learn phrase patterns from annotated spans.
    ///
    /// Spans that are out of range or not on character boundaries are skipped.
    /// Returns the number of patterns added.
    pub fn train(&mut self, examples: &[TrainingExample<'_>]) -> usize {
        let before = self.patterns.len();
        for (text, spans) in examples {
            for &(start, end, label) in spans.iter() {
                if let Some(phrase) = text.get(start..end) {
                    self.add_pattern(label, phrase);
                }
            }
        }
        self.patterns.len() - before
    }

    /// Case-insensitive matching folds with Unicode lowercase. The candidate
    /// span always has the phrase's byte length, so a case variant encoded
    /// with a different length (`ẞ` against `ß`) does not match.
    fn phrase_matches(&self, candidate: &str, phrase: &str) -> bool {
        if self.case_sensitive {
            candidate == phrase
        } else {
            candidate
                .chars()
                .flat_map(char::to_lowercase)
                .eq(phrase.chars().flat_map(char::to_lowercase))
        }
    }

    /// Find entities in `text`.
    pub fn predict(&self, text: &str) -> Doc {
        let mut by_length: Vec<&EntityPattern> = self.patterns.iter().collect();
        by_length.sort_by(|a, b| b.phrase.len().cmp(&a.phrase.len()));

        let mut entities = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            if !text.is_char_boundary(pos) || !is_word_start(text, pos) {
                pos += 1;
                continue;
            }
            let found = by_length.iter().find(|p| {
                let end = pos + p.phrase.len();
                end <= text.len()
                    && text.is_char_boundary(end)
                    && is_word_end(text, end)
                    && self.phrase_matches(&text[pos..end], &p.phrase)
            });
            match found {
                Some(p) => {
                    let end = pos + p.phrase.len();
                    entities.push(Entity {
                        text: text[pos..end].to_string(),
                        label: p.label.clone(),
                        start: pos,
                        end,
                    });
                    pos = end;
                }
                None => pos += 1,
            }
        }

        Doc { text: text.to_string(), entities }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_start(text: &str, pos: usize) -> bool {
    text[..pos].chars().next_back().map_or(true, |c| !is_word_char(c))
}

fn is_word_end(text: &str, end: usize) -> bool {
    text[end..].chars().next().map_or(true, |c| !is_word_char(c))
}

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    lang: String,
    name: String,
    version: String,
    case_sensitive: bool,
    labels: Vec<String>,
}

/// Store adapter for [`EntityRuler`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityRulerAdapter;

#[async_trait]
impl ModelAdapter for EntityRulerAdapter {
    type Model = EntityRuler;

    fn id(&self) -> &str {
        ENTITY_RULER_ID
    }

    fn provides(&self) -> Vec<(String, String)> {
        vec![(ENTITY_RULER_PACKAGE.to_string(), ENTITY_RULER_VERSION.to_string())]
    }

    fn list_requirements(&self, _model: &EntityRuler) -> Vec<String> {
        vec![format!("{}=={}", ENTITY_RULER_PACKAGE, ENTITY_RULER_VERSION)]
    }

    async fn save(&self, model: &EntityRuler, target_dir: &Path) -> Result<AdapterOptions, AdapterError> {
        let labels = model.labels();
        let meta = Meta {
            lang: model.lang.clone(),
            name: ENTITY_RULER_ID.to_string(),
            version: ENTITY_RULER_VERSION.to_string(),
            case_sensitive: model.case_sensitive,
            labels: labels.clone(),
        };
        tokio::fs::write(target_dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?).await?;
        tokio::fs::write(
            target_dir.join(PATTERNS_FILE),
            serde_json::to_vec_pretty(&model.patterns)?,
        )
        .await?;

        let mut options = AdapterOptions::new();
        options.insert("lang".into(), Value::from(model.lang.clone()));
        options.insert("pipeline".into(), Value::from(vec![ENTITY_RULER_ID]));
        options.insert("labels".into(), Value::from(labels));
        Ok(options)
    }

    async fn load(&self, dir: &Path, _manifest: &Manifest) -> Result<EntityRuler, AdapterError> {
        let meta: Meta = serde_json::from_slice(&tokio::fs::read(dir.join(META_FILE)).await?)?;
        if meta.name != ENTITY_RULER_ID {
            return Err(AdapterError::InvalidData(format!(
                "{} describes {:?}, expected {:?}",
                META_FILE, meta.name, ENTITY_RULER_ID
            )));
        }
        let patterns: Vec<EntityPattern> =
            serde_json::from_slice(&tokio::fs::read(dir.join(PATTERNS_FILE)).await?)?;

        Ok(EntityRuler { lang: meta.lang, case_sensitive: meta.case_sensitive, patterns })
    }
}
