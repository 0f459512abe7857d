// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiler configuration.
//!
//! Configuration comes from two layers: programmatic [`Options`] passed
//! to `Compiler::new`, and an optional `presto.toml` at the project root
//! which fills in anything the caller left at its default.
//!
//! # Example Configuration
//!
//! ```toml
//! [build]
//! build_dir = ".presto"
//! ignore = ["fixtures/", "*.snapshot"]
//! concurrency = 4
//!
//! [dev]
//! debounce_ms = 500
//! command = "node"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default build directory name.
pub const DEFAULT_BUILD_DIR: &str = ".presto";

/// Name of the per-directory ignore file.
pub const IGNORE_FILENAME: &str = ".prestoignore";

/// Built-in exclude patterns applied before any user pattern.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    DEFAULT_BUILD_DIR,
    IGNORE_FILENAME,
    "node_modules",
    "public",
];

/// Programmatic compiler options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Whether to build in production mode (minified artifacts, manifest
    /// and passthrough outputs enabled).
    pub production: bool,

    /// Build directory, relative to the project root.
    pub build_dir: String,

    /// Extra ignore patterns layered over the built-in defaults.
    pub ignore: Vec<String>,

    /// Debounce window for watch mode, in milliseconds.
    pub debounce_ms: u64,

    /// Maximum number of files transformed concurrently.
    pub concurrency: usize,

    /// Command used to run the generated server entry.
    pub command: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            production: false,
            build_dir: DEFAULT_BUILD_DIR.to_string(),
            ignore: Vec::new(),
            debounce_ms: 500,
            concurrency: 1,
            command: "node".to_string(),
        }
    }
}

impl Options {
    /// Loads `presto.toml` from the project root, if present, and merges
    /// it under these options (explicit options win).
    pub fn merge_config(mut self, root: &Path) -> Result<Self> {
        let Some(config) = Config::load(root)? else {
            return Ok(self);
        };

        let defaults = Options::default();
        if self.build_dir == defaults.build_dir {
            if let Some(dir) = config.build.build_dir {
                self.build_dir = dir;
            }
        }
        if self.debounce_ms == defaults.debounce_ms {
            if let Some(ms) = config.dev.debounce_ms {
                self.debounce_ms = ms;
            }
        }
        if self.concurrency == defaults.concurrency {
            if let Some(n) = config.build.concurrency {
                self.concurrency = n.max(1);
            }
        }
        if self.command == defaults.command {
            if let Some(cmd) = config.dev.command {
                self.command = cmd;
            }
        }
        self.ignore.extend(config.build.ignore);
        Ok(self)
    }
}

/// Contents of `presto.toml`.
#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    build: BuildConfig,
    #[serde(default)]
    dev: DevConfig,
}

#[derive(Debug, Default, Deserialize)]
struct BuildConfig {
    #[serde(default)]
    build_dir: Option<String>,
    #[serde(default)]
    ignore: Vec<String>,
    #[serde(default)]
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DevConfig {
    #[serde(default)]
    debounce_ms: Option<u64>,
    #[serde(default)]
    command: Option<String>,
}

impl Config {
    fn load(root: &Path) -> Result<Option<Self>> {
        let path = root.join("presto.toml");
        match std::fs::read_to_string(&path) {
            Ok(src) => {
                let config =
                    toml::from_str(&src).map_err(|e| Error::Config(e.to_string()))?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert!(!opts.production);
        assert_eq!(opts.build_dir, ".presto");
        assert_eq!(opts.debounce_ms, 500);
        assert_eq!(opts.concurrency, 1);
    }

    #[test]
    fn test_merge_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("presto.toml"),
            r#"
            [build]
            build_dir = ".out"
            ignore = ["fixtures/"]
            concurrency = 4

            [dev]
            debounce_ms = 200
            "#,
        )
        .unwrap();

        let opts = Options::default().merge_config(dir.path()).unwrap();
        assert_eq!(opts.build_dir, ".out");
        assert_eq!(opts.debounce_ms, 200);
        assert_eq!(opts.concurrency, 4);
        assert_eq!(opts.ignore, vec!["fixtures/".to_string()]);
    }

    #[test]
    fn test_explicit_options_win_over_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("presto.toml"),
            "[dev]\ndebounce_ms = 200\n",
        )
        .unwrap();

        let opts = Options {
            debounce_ms: 1000,
            ..Options::default()
        };
        let opts = opts.merge_config(dir.path()).unwrap();
        assert_eq!(opts.debounce_ms, 1000);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("presto.toml"), "not toml [").unwrap();
        assert!(Options::default().merge_config(dir.path()).is_err());
    }
}
