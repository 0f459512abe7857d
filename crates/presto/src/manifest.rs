// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project manifest access.
//!
//! The compiled application is a JavaScript app, so its manifest is a
//! `package.json` at the project root. The build pipeline reads it for
//! the dependency tables (plugin load order, generated server entry,
//! production manifest) and for the `presto` entry key that marks a
//! package as a plugin.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The manifest key a package uses to declare itself a presto plugin.
pub const PLUGIN_KEY: &str = "presto";

/// A parsed `package.json`.
///
/// Dependency tables are `BTreeMap`s, so every ordered walk over them is
/// deterministic regardless of the JSON's own key order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Package version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Runtime dependencies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    /// Build-time dependencies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Plugin entry point, when this package is itself a presto plugin.
    #[serde(default, rename = "presto", skip_serializing_if = "Option::is_none")]
    pub presto: Option<serde_json::Value>,
}

impl Manifest {
    /// Loads the manifest from `<dir>/package.json`.
    ///
    /// A missing manifest is not an error; the project simply has no
    /// declared dependencies or plugins.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("package.json");
        match std::fs::read_to_string(&path) {
            Ok(src) => Ok(serde_json::from_str(&src)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether this manifest declares the plugin entry key.
    pub fn declares_plugin(&self) -> bool {
        self.presto.is_some()
    }

    /// Runtime dependency names in deterministic order.
    pub fn runtime_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Dev dependency names in deterministic order.
    pub fn dev_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dev_dependencies.keys().map(String::as_str)
    }
}

/// Reads the manifest of a resolved dependency under `node_modules`.
///
/// Returns `None` when the package or its manifest does not exist, which
/// callers treat as "not installed" rather than an error.
pub fn dependency_manifest(root: &Path, name: &str) -> Result<Option<Manifest>> {
    let path = root.join("node_modules").join(name).join("package.json");
    match std::fs::read_to_string(&path) {
        Ok(src) => Ok(Some(serde_json::from_str(&src)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
