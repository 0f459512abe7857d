// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The client script bundle.
//!
//! Every client-targeted script file becomes a module in a small
//! CommonJS-style loader. Relative `require()` specifiers are resolved
//! against the registry at build time; bare ids (packages, injected
//! virtual modules) stay external and fall through to a host `require`.
//!
//! Wrapping a module is cached per file, keyed by a hash of the
//! transformed content, so an incremental compile only re-wraps the
//! files that actually changed. Removals drop the whole cache.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lazy_static::lazy_static;
use lru::LruCache;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::file::{FileType, Target};
use crate::minify;
use crate::output::{Artifact, OutputContext, OutputGenerator};

const CACHE_CAPACITY: usize = 512;

lazy_static! {
    static ref REQUIRE: Regex =
        Regex::new(r#"require\(\s*(['"])([^'"]+)['"]\s*\)"#).unwrap();
}

struct CachedModule {
    hash: String,
    wrapped: String,
}

/// Bundles client-targeted scripts into `client.js`.
pub struct ClientScriptsOutput {
    cache: Mutex<LruCache<String, CachedModule>>,
}

impl ClientScriptsOutput {
    /// Creates the generator with an empty module cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }
}

impl Default for ClientScriptsOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputGenerator for ClientScriptsOutput {
    fn name(&self) -> &str {
        "client-scripts"
    }

    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>> {
        let scripts: Vec<_> = ctx.files_for(FileType::Script, Target::Client).collect();
        let module_paths: HashSet<&str> = scripts.iter().map(|f| f.path()).collect();

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Cache("bundle cache lock poisoned".to_string()))?;

        let mut modules = String::new();
        let mut entries = Vec::new();
        for file in &scripts {
            let content = file.content().unwrap_or("");
            let hash = content_hash(content);

            let hit = cache
                .get(file.path())
                .is_some_and(|cached| cached.hash == hash);
            if !hit {
                let wrapped = wrap_module(file.path(), content, &module_paths);
                cache.put(file.path().to_string(), CachedModule { hash, wrapped });
            }

            // the entry is guaranteed present after the put above
            if let Some(cached) = cache.get(file.path()) {
                modules.push_str(&cached.wrapped);
            }
            entries.push(file.path().to_string());
        }
        drop(cache);

        for module in ctx.modules_for(FileType::Script, Target::Client) {
            entries.push(module.path().to_string());
        }

        let entry_list = serde_json::to_string(&entries)?;
        let mut bundle = format!(
            ";(function(modules, entries) {{\n{}\n}})({{\n{}}}, {});\n",
            LOADER, modules, entry_list
        );

        if ctx.production {
            bundle = minify::minify_js(&bundle);
        }

        Ok(vec![Artifact::text("client.js", bundle)])
    }

    fn invalidate(&self, removed: &[String]) {
        // removal can re-route require() resolution anywhere, so drop
        // the whole cache rather than just the removed entries
        if !removed.is_empty() {
            if let Ok(mut cache) = self.cache.lock() {
                cache.clear();
            }
        }
    }
}

const LOADER: &str = r#"  var cache = {};
  function load(id) {
    if (Object.prototype.hasOwnProperty.call(cache, id)) return cache[id].exports;
    if (!Object.prototype.hasOwnProperty.call(modules, id)) {
      if (typeof require === "function") return require(id);
      throw new Error("Cannot find module '" + id + "'");
    }
    var module = cache[id] = { exports: {} };
    modules[id].call(module.exports, load, module, module.exports);
    return module.exports;
  }
  for (var i = 0; i < entries.length; i++) load(entries[i]);"#;

fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn wrap_module(path: &str, content: &str, module_paths: &HashSet<&str>) -> String {
    let resolved = REQUIRE.replace_all(content, |caps: &Captures| {
        let spec = &caps[2];
        match resolve(path, spec, module_paths) {
            Some(target) => format!("require({})", quote(&target)),
            None => caps[0].to_string(),
        }
    });

    format!(
        "{}: function(require, module, exports) {{\n{}\n}},\n",
        quote(path),
        resolved
    )
}

/// Resolves a relative specifier against the bundled module set.
///
/// Tries the normalized path itself, then with a `.js` extension, then
/// as a directory index. Bare specifiers are external by contract.
fn resolve(from: &str, spec: &str, module_paths: &HashSet<&str>) -> Option<String> {
    if !spec.starts_with("./") && !spec.starts_with("../") {
        return None;
    }

    let mut segments: Vec<&str> = from.split('/').collect();
    segments.pop();
    for part in spec.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    let base = segments.join("/");

    for candidate in [base.clone(), format!("{}.js", base), format!("{}/index.js", base)] {
        if module_paths.contains(candidate.as_str()) {
            return Some(candidate);
        }
    }
    None
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}
