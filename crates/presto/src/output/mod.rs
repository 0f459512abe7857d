// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Output generation.
//!
//! Generators are independent functions from an immutable registry
//! snapshot to named artifacts. They never mutate the registry, so the
//! compiler runs all of them concurrently once a transform batch has
//! fully resolved.

mod client_scripts;
mod gitignore;
mod package_json;
mod passthrough;
mod server_entry;
mod styles;

pub use client_scripts::ClientScriptsOutput;
pub use gitignore::GitignoreOutput;
pub use package_json::PackageJsonOutput;
pub use passthrough::PassthroughOutput;
pub use server_entry::ServerEntryOutput;
pub use styles::StylesOutput;

use std::sync::Arc;

use crate::error::Result;
use crate::file::{File, FileType, Target};
use crate::manifest::Manifest;

/// One generated artifact, addressed relative to the output root.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Output-relative path.
    pub path: String,
    /// Artifact bytes.
    pub content: Vec<u8>,
}

impl Artifact {
    /// Convenience constructor for text artifacts.
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into().into_bytes(),
        }
    }
}

/// Immutable snapshot handed to every generator of one compile.
#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Registry files in scan order, tombstones already evicted.
    pub files: Vec<File>,
    /// Injected virtual modules, in registration order.
    pub modules: Vec<File>,
    /// The project manifest as of setup.
    pub manifest: Manifest,
    /// Whether this is a production build.
    pub production: bool,
}

impl OutputContext {
    /// Files of the given type and target, in scan order.
    pub fn files_for(&self, file_type: FileType, target: Target) -> impl Iterator<Item = &File> {
        self.files
            .iter()
            .filter(move |f| f.file_type() == file_type && f.is_target(target))
    }

    /// Virtual modules of the given type and target, in registration order.
    pub fn modules_for(&self, file_type: FileType, target: Target) -> impl Iterator<Item = &File> {
        self.modules
            .iter()
            .filter(move |f| f.file_type() == file_type && f.is_target(target))
    }
}

/// An output generator.
///
/// Implementations must be safe to call concurrently with other
/// generators; the context is read-only and any generator-internal cache
/// has to synchronize itself.
pub trait OutputGenerator: Send + Sync {
    /// Registered name, used for options lookup and error attribution.
    fn name(&self) -> &str;

    /// Produces artifacts for this compile.
    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>>;

    /// Notifies the generator that paths were removed from the registry,
    /// before the next `generate` call.
    fn invalidate(&self, _removed: &[String]) {}
}

/// The default generator set. Registration order does not affect
/// results; generators are independent of each other.
pub fn default_outputs() -> Vec<Arc<dyn OutputGenerator>> {
    vec![
        Arc::new(StylesOutput),
        Arc::new(ClientScriptsOutput::new()),
        Arc::new(ServerEntryOutput),
        Arc::new(PackageJsonOutput),
        Arc::new(PassthroughOutput),
        Arc::new(GitignoreOutput),
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a context from `(path, type, targets, content)` tuples.
    pub fn context(
        files: Vec<(&str, FileType, Vec<Target>, &str)>,
        production: bool,
    ) -> OutputContext {
        let files = files
            .into_iter()
            .map(|(path, file_type, targets, content)| {
                let mut f = File::new(path);
                f.set_type(file_type);
                f.set_targets(targets);
                f.set_content(content);
                f
            })
            .collect();
        OutputContext {
            files,
            modules: Vec::new(),
            manifest: Manifest::default(),
            production,
        }
    }
}
