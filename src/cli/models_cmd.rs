// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Store CLI subcommands: list, get, path, verify, check, import-project.
//!
//! Every command returns a process exit code; errors are printed to stderr.

use std::path::Path;

use super::{exit_code_for, EXIT_SUCCESS};
use crate::error::StoreError;
use crate::models::{Manifest, ModelStore, SaveOptions};

fn report(err: &StoreError) -> i32 {
    eprintln!("Error: {}", err);
    exit_code_for(err)
}

/// Run `list [NAME] [--json]`.
pub async fn run_list(store: &ModelStore, name: Option<&str>, json: bool) -> i32 {
    match store.list(name).await {
        Ok(manifests) if json => print_json(&manifests),
        Ok(manifests) => {
            print_manifests(&manifests);
            EXIT_SUCCESS
        }
        Err(e) => report(&e),
    }
}

/// Run `get TAG [--json]`.
pub async fn run_get(store: &ModelStore, tag: &str, json: bool) -> i32 {
    match store.get(tag).await {
        Ok(manifest) if json => print_json(&manifest),
        Ok(manifest) => {
            println!("{}", manifest_detail(store, &manifest));
            EXIT_SUCCESS
        }
        Err(e) => report(&e),
    }
}

/// Run `path TAG`: print the artifact directory.
pub async fn run_path(store: &ModelStore, tag: &str) -> i32 {
    let result = async {
        let manifest = store.get(tag).await?;
        Ok::<_, StoreError>(store.path_of(&manifest.tag()?))
    }
    .await;
    match result {
        Ok(path) => {
            println!("{}", path.display());
            EXIT_SUCCESS
        }
        Err(e) => report(&e),
    }
}

/// Run `verify TAG`: recompute the payload digest.
pub async fn run_verify(store: &ModelStore, tag: &str) -> i32 {
    match store.verify(tag).await {
        Ok(digest) => {
            println!(
                "OK {} sha256:{} ({} files, {} bytes)",
                tag, digest.value, digest.file_count, digest.size_bytes
            );
            EXIT_SUCCESS
        }
        Err(e) => report(&e),
    }
}

/// Run `check TAG`: check requirements against the environment.
pub async fn run_check(store: &ModelStore, tag: &str) -> i32 {
    match store.check_requirements(tag).await {
        Ok(manifest) => {
            println!(
                "All {} requirement(s) of {}:{} are satisfied.",
                manifest.all_requirements().len(),
                manifest.name,
                manifest.version
            );
            EXIT_SUCCESS
        }
        Err(StoreError::Dependency { tag, unmet }) => {
            eprintln!("Unmet requirements for {}:", tag);
            for u in &unmet {
                eprintln!("  - {}", u);
            }
            eprintln!("{}", available_packages(store));
            super::EXIT_FAILURE
        }
        Err(e) => report(&e),
    }
}

/// Run `import-project NAME DIR`.
pub async fn run_import_project(store: &ModelStore, name: &str, dir: &Path) -> i32 {
    match store.save_project(name, dir, SaveOptions::new()).await {
        Ok(tag) => {
            println!("{}", tag);
            EXIT_SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            EXIT_SUCCESS
        }
        Err(e) => report(&StoreError::from(e)),
    }
}

/// Format and print manifests as a table on stdout.
pub fn print_manifests(manifests: &[Manifest]) {
    if manifests.is_empty() {
        println!("No artifacts in store.");
        return;
    }

    println!(
        "{:<24} {:<32} {:<8} {:<14} {:>12}",
        "NAME", "VERSION", "KIND", "ADAPTER", "SIZE (KB)"
    );
    println!("{}", "-".repeat(94));

    for m in manifests {
        let size_kb = m.digest.as_ref().map_or(0, |d| d.size_bytes / 1024);
        println!(
            "{:<24} {:<32} {:<8} {:<14} {:>12}",
            truncate(&m.name, 23),
            truncate(&m.version, 31),
            m.kind,
            truncate(m.adapter_id.as_deref().unwrap_or("-"), 13),
            size_kb,
        );
    }

    println!("{}", "-".repeat(94));
    println!("{} artifact(s)", manifests.len());
}

fn manifest_detail(store: &ModelStore, m: &Manifest) -> String {
    let mut out = Vec::new();
    out.push(format!("Tag:          {}:{}", m.name, m.version));
    out.push(format!("Kind:         {}", m.kind));
    out.push(format!("Created:      {}", m.created_at.to_rfc3339()));
    if let Some(adapter) = &m.adapter_id {
        match store.registry().resolve(adapter) {
            Ok(a) => out.push(format!("Adapter:      {} ({})", adapter, a.model_type())),
            Err(_) => out.push(format!("Adapter:      {} (not registered)", adapter)),
        }
    }
    if let Some(source) = &m.source {
        out.push(format!("Source:       {}", source));
    }
    if let Some(d) = &m.digest {
        out.push(format!("Digest:       {}:{}", d.algorithm, d.value));
        out.push(format!("Size:         {} bytes in {} file(s)", d.size_bytes, d.file_count));
    }
    let requirements = m.all_requirements();
    if requirements.is_empty() {
        out.push("Requirements: (none)".into());
    } else {
        out.push("Requirements:".into());
        out.extend(requirements.iter().map(|r| format!("  - {}", r)));
    }
    out.join("\n")
}

fn available_packages(store: &ModelStore) -> String {
    let packages: Vec<String> = store
        .registry()
        .environment()
        .packages()
        .map(|(name, version)| format!("{}=={}", name, version))
        .collect();
    if packages.is_empty() {
        "Available packages: (none)".into()
    } else {
        format!("Available packages: {}", packages.join(", "))
    }
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
