// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Store configuration loading from a TOML file and environment variables.
//!
//! Values are layered: built-in defaults, then the TOML file named by
//! `GG_STORE_CONFIG` (if set), then individual `GG_STORE_*` variables.
//! Invalid environment values fall back to the lower layer without crashing;
//! an unreadable or malformed config file is an error.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GG_STORE_CONFIG` | unset | Path to a TOML config file |
//! | `GG_STORE_HOME` | `./model-store` | Store root directory |
//! | `GG_STORE_VERIFY_ON_LOAD` | false | Re-check content digests on load |
//! | `GG_STORE_PACKAGES` | empty | Extra available packages, `name==version,...` |
//! | `GG_STORE_LOG_LEVEL` | info | Log filter directive |
//! | `GG_STORE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `GG_STORE_LOG_FILE` | unset | Log to this file instead of stderr |

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::models::requirement::parse_package_list;
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_HOME: &str = "./model-store";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Optional overrides read from a TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    home: Option<PathBuf>,
    verify_on_load: Option<bool>,
    #[serde(default)]
    packages: Vec<PackageEntry>,
    log: Option<FileLogConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageEntry {
    name: String,
    version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLogConfig {
    level: Option<String>,
    format: Option<LogFormat>,
    file: Option<PathBuf>,
}

/// Effective store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub home: PathBuf,
    pub verify_on_load: bool,
    /// Packages declared available beyond those adapters provide.
    pub packages: Vec<(String, String)>,
    pub log: LogConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(DEFAULT_HOME),
            verify_on_load: false,
            packages: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl StoreConfig {
    /// Parse a TOML document and apply it over the defaults.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::default();
        config.apply_file(file);
        Ok(config)
    }

    /// Read a TOML config file and apply it over the defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content, path)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(home) = file.home {
            self.home = home;
        }
        if let Some(verify) = file.verify_on_load {
            self.verify_on_load = verify;
        }
        self.packages
            .extend(file.packages.into_iter().map(|p| (p.name, p.version)));
        if let Some(log) = file.log {
            if let Some(level) = log.level {
                self.log.level = level;
            }
            if let Some(format) = log.format {
                self.log.format = format;
            }
            if log.file.is_some() {
                self.log.output_path = log.file;
            }
        }
    }

    /// Apply `GG_STORE_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(home) = env_nonempty("GG_STORE_HOME") {
            self.home = PathBuf::from(home);
        }
        if let Some(verify) = env_nonempty("GG_STORE_VERIFY_ON_LOAD").and_then(|v| parse_bool(&v)) {
            self.verify_on_load = verify;
        }
        if let Some(list) = env_nonempty("GG_STORE_PACKAGES") {
            match parse_package_list(&list) {
                Ok(packages) => self.packages.extend(packages),
                Err(e) => tracing::warn!(error = %e, "ignoring GG_STORE_PACKAGES"),
            }
        }
        if let Some(level) = env_nonempty("GG_STORE_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = env_nonempty("GG_STORE_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.log.format = format;
        }
        if let Some(file) = env_nonempty("GG_STORE_LOG_FILE") {
            self.log.output_path = Some(PathBuf::from(file));
        }
    }

    /// Return a printable summary of all effective values.
    pub fn effective_config(&self) -> Vec<(&'static str, String)> {
        let packages = self
            .packages
            .iter()
            .map(|(n, v)| format!("{}=={}", n, v))
            .collect::<Vec<_>>()
            .join(",");
        let format = match self.log.format {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        vec![
            ("GG_STORE_HOME", self.home.display().to_string()),
            ("GG_STORE_VERIFY_ON_LOAD", self.verify_on_load.to_string()),
            ("GG_STORE_PACKAGES", packages),
            ("GG_STORE_LOG_LEVEL", self.log.level.clone()),
            ("GG_STORE_LOG_FORMAT", format.to_string()),
            (
                "GG_STORE_LOG_FILE",
                self.log
                    .output_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
        ]
    }
}

/// Load configuration: defaults, then `GG_STORE_CONFIG` file, then env.
pub fn load() -> Result<StoreConfig, ConfigError> {
    let mut config = match env_nonempty("GG_STORE_CONFIG") {
        Some(path) => StoreConfig::from_toml_file(Path::new(&path))?,
        None => StoreConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "GG_STORE_CONFIG",
        "GG_STORE_HOME",
        "GG_STORE_VERIFY_ON_LOAD",
        "GG_STORE_PACKAGES",
        "GG_STORE_LOG_LEVEL",
        "GG_STORE_LOG_FORMAT",
        "GG_STORE_LOG_FILE",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load().unwrap();
        assert_eq!(cfg.home, PathBuf::from(DEFAULT_HOME));
        assert!(!cfg.verify_on_load);
        assert!(cfg.packages.is_empty());
        assert_eq!(cfg.log, LogConfig::default());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GG_STORE_HOME", "/srv/models");
        std::env::set_var("GG_STORE_VERIFY_ON_LOAD", "yes");
        std::env::set_var("GG_STORE_PACKAGES", "spacy==3.2.1,numpy==1.26.0");
        std::env::set_var("GG_STORE_LOG_FORMAT", "pretty");
        std::env::set_var("GG_STORE_LOG_LEVEL", "debug");
        let cfg = load().unwrap();
        assert_eq!(cfg.home, PathBuf::from("/srv/models"));
        assert!(cfg.verify_on_load);
        assert_eq!(cfg.packages.len(), 2);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.log.level, "debug");
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("GG_STORE_VERIFY_ON_LOAD", "maybe");
        std::env::set_var("GG_STORE_LOG_FORMAT", "xml");
        std::env::set_var("GG_STORE_PACKAGES", "spacy");
        let cfg = load().unwrap();
        assert!(!cfg.verify_on_load);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert!(cfg.packages.is_empty());
        clear_env_vars();
    }

    #[test]
    fn test_toml_file_then_env_layering() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.toml");
        std::fs::write(
            &path,
            r#"
home = "/data/store"
verify_on_load = true

[[packages]]
name = "spacy"
version = "3.2.1"

[log]
level = "warn"
format = "pretty"
"#,
        )
        .unwrap();
        std::env::set_var("GG_STORE_CONFIG", &path);
        std::env::set_var("GG_STORE_HOME", "/override");

        let cfg = load().unwrap();
        assert_eq!(cfg.home, PathBuf::from("/override"));
        assert!(cfg.verify_on_load);
        assert_eq!(cfg.packages, vec![("spacy".to_string(), "3.2.1".to_string())]);
        assert_eq!(cfg.log.level, "warn");
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let err = StoreConfig::from_toml_str("home = [", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = StoreConfig::from_toml_str("unknown_key = 1", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = StoreConfig::from_toml_file(Path::new("/nonexistent/gg-store.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_effective_config_lists_every_key() {
        let cfg = StoreConfig::default();
        let keys: Vec<_> = cfg.effective_config().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&"GG_STORE_HOME"));
    }
}
