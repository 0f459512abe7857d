// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Plugin loading.
//!
//! A plugin is a native extension registered on the compiler before
//! `setup()`. The project manifest decides which extensions activate and
//! in what order: the project itself first (under [`SELF_PLUGIN`]), then
//! runtime dependencies, then dev dependencies. A dependency activates
//! when its own manifest declares the `presto` entry key; each plugin is
//! invoked at most once with the live compiler, however often it is
//! referenced.
//!
//! A declared plugin with no matching extension (or whose registration
//! fails) is logged and skipped — unless it is the self-plugin, which is
//! fatal to that `setup()`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::manifest::{dependency_manifest, Manifest};

/// Registry name reserved for the project's own plugin entry.
pub const SELF_PLUGIN: &str = ".";

/// A native compiler extension.
///
/// `register` is called exactly once, during `setup()`, with the live
/// compiler; this is where a plugin adds transform stages, output
/// generators and virtual modules.
pub trait Plugin: Send + Sync {
    /// The dependency name this plugin is registered under.
    fn name(&self) -> &str;

    /// Attaches the plugin to the compiler.
    fn register(&self, compiler: &Compiler) -> Result<()>;
}

/// Resolves manifest-declared plugins against registered extensions.
#[derive(Default)]
pub struct PluginLoader {
    registry: HashMap<String, Arc<dyn Plugin>>,
    loaded: Vec<String>,
}

impl PluginLoader {
    /// An empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension under a dependency name (or [`SELF_PLUGIN`]).
    pub fn add(&mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.registry.insert(name.into(), plugin);
    }

    /// Names of plugins that have loaded, in load order.
    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }

    /// Walks the manifest and invokes every activating plugin once.
    pub fn load_all(
        &mut self,
        compiler: &Compiler,
        manifest: &Manifest,
        root: &Path,
    ) -> Result<()> {
        // the project's own plugin first; failure here is fatal
        if manifest.declares_plugin() {
            self.load_one(compiler, SELF_PLUGIN)?;
        }

        let names: Vec<String> = manifest
            .runtime_dependencies()
            .chain(manifest.dev_dependencies())
            .map(str::to_string)
            .collect();

        for name in names {
            if self.loaded.iter().any(|n| n == &name) {
                continue;
            }

            let declared = match dependency_manifest(root, &name) {
                Ok(Some(dep)) => dep.declares_plugin(),
                Ok(None) => false,
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "skipping unreadable plugin manifest");
                    false
                }
            };
            if !declared {
                continue;
            }

            if let Err(e) = self.load_one(compiler, &name) {
                tracing::warn!(plugin = %name, error = %e, "plugin failed to load, skipping");
            }
        }

        Ok(())
    }

    fn load_one(&mut self, compiler: &Compiler, name: &str) -> Result<()> {
        if self.loaded.iter().any(|n| n == name) {
            return Ok(());
        }

        let plugin = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| Error::PluginLoad {
                name: name.to_string(),
                reason: "no registered extension for declared plugin".to_string(),
            })?;

        plugin.register(compiler).map_err(|e| Error::PluginLoad {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        self.loaded.push(name.to_string());
        tracing::debug!(plugin = %name, "plugin loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingPlugin {
        name: String,
        calls: Arc<AtomicUsize>,
    }

    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn register(&self, _compiler: &Compiler) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn plugin_package(root: &Path, name: &str) {
        let dir = root.join("node_modules").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("package.json"),
            format!(r#"{{ "name": "{}", "presto": "build.js" }}"#, name),
        )
        .unwrap();
    }

    fn plain_package(root: &Path, name: &str) {
        let dir = root.join("node_modules").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), format!(r#"{{ "name": "{}" }}"#, name))
            .unwrap();
    }

    fn compiler_in(dir: &Path) -> Compiler {
        Compiler::new(dir, crate::config::Options::default()).unwrap()
    }

    #[tokio::test]
    async fn test_declared_plugin_loads_once() {
        let dir = TempDir::new().unwrap();
        plugin_package(dir.path(), "presto-models");

        let calls = Arc::new(AtomicUsize::new(0));
        let compiler = compiler_in(dir.path());
        let mut loader = PluginLoader::new();
        loader.add(
            "presto-models",
            Arc::new(CountingPlugin {
                name: "presto-models".to_string(),
                calls: calls.clone(),
            }),
        );

        let mut manifest = Manifest::default();
        manifest
            .dependencies
            .insert("presto-models".to_string(), "~1.0.0".to_string());
        // referenced twice: runtime and dev
        manifest
            .dev_dependencies
            .insert("presto-models".to_string(), "~1.0.0".to_string());

        loader.load_all(&compiler, &manifest, dir.path()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loader.loaded(), ["presto-models"]);
    }

    #[tokio::test]
    async fn test_undeclared_dependency_is_not_a_plugin() {
        let dir = TempDir::new().unwrap();
        plain_package(dir.path(), "leftpad");

        let compiler = compiler_in(dir.path());
        let mut loader = PluginLoader::new();
        let mut manifest = Manifest::default();
        manifest
            .dependencies
            .insert("leftpad".to_string(), "~1.0.0".to_string());

        loader.load_all(&compiler, &manifest, dir.path()).unwrap();
        assert!(loader.loaded().is_empty());
    }

    #[tokio::test]
    async fn test_declared_without_extension_is_skipped() {
        let dir = TempDir::new().unwrap();
        plugin_package(dir.path(), "presto-auth");

        let compiler = compiler_in(dir.path());
        let mut loader = PluginLoader::new();
        let mut manifest = Manifest::default();
        manifest
            .dependencies
            .insert("presto-auth".to_string(), "~1.0.0".to_string());

        // logged and skipped, not fatal
        loader.load_all(&compiler, &manifest, dir.path()).unwrap();
        assert!(loader.loaded().is_empty());
    }

    #[tokio::test]
    async fn test_missing_self_plugin_is_fatal() {
        let dir = TempDir::new().unwrap();
        let compiler = compiler_in(dir.path());
        let mut loader = PluginLoader::new();
        let manifest = Manifest {
            presto: Some(serde_json::json!("build.js")),
            ..Manifest::default()
        };

        let err = loader.load_all(&compiler, &manifest, dir.path()).unwrap_err();
        assert!(matches!(err, Error::PluginLoad { name, .. } if name == SELF_PLUGIN));
    }
}
