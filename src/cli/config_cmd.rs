// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.

use super::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};
use crate::config::{self, StoreConfig};
use crate::models::requirement::Environment;

/// Print effective config as key-value pairs to stdout.
///
/// Returns 2 if the config file cannot be loaded.
pub fn run_show() -> i32 {
    match config::load() {
        Ok(cfg) => {
            print_config(&cfg);
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_USAGE
        }
    }
}

/// Print default config values (no file or env overrides) to stdout.
pub fn run_defaults() {
    print_config(&StoreConfig::default());
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if loading fails.
pub fn run_validate() -> i32 {
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };
    let warnings = validate(&cfg);
    for w in &warnings {
        eprintln!("WARNING: {}", w);
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

fn validate(cfg: &StoreConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if cfg.home.exists() && !cfg.home.is_dir() {
        warnings.push(format!("GG_STORE_HOME ({}) is not a directory", cfg.home.display()));
    }

    let mut env = Environment::new();
    for (name, version) in &cfg.packages {
        if let Err(e) = env.insert(name, version) {
            warnings.push(format!("GG_STORE_PACKAGES entry {}=={}: {}", name, version, e));
        }
    }

    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&cfg.log.level) {
        warnings.push(format!("GG_STORE_LOG_LEVEL {:?}: {}", cfg.log.level, e));
    }

    warnings
}

fn print_config(cfg: &StoreConfig) {
    for (key, value) in cfg.effective_config() {
        println!("{}={}", key, value);
    }
}
