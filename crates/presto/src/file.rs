// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The file model shared by the registry, the transform pipeline and the
//! output generators.
//!
//! A [`File`] is identified by its relative path, which is unique and
//! stable for the lifetime of the registry entry. Virtual modules are
//! `File`s without filesystem backing: they are injected by plugins under
//! a module id and participate in output generation, but are never
//! scanned or mtime-cached.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Generated-artifact category of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// JavaScript source, bundled or required.
    Script,
    /// Stylesheet source, concatenated into the client stylesheet.
    Style,
    /// Not recognized by any classifier; copied verbatim when packing.
    Unclassified,
}

impl FileType {
    /// Stable string form used by the cache store.
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Script => "script",
            FileType::Style => "style",
            FileType::Unclassified => "unclassified",
        }
    }

    /// Parses the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "script" => Some(FileType::Script),
            "style" => Some(FileType::Style),
            "unclassified" => Some(FileType::Unclassified),
            _ => None,
        }
    }
}

/// Execution environment a file is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Ships in the browser bundle.
    Client,
    /// Required by the generated server entry.
    Server,
}

/// A source file (or virtual module) known to the compiler.
#[derive(Debug, Clone)]
pub struct File {
    path: String,
    file_type: FileType,
    targets: Vec<Target>,
    removed: bool,
    is_module: bool,
    content: Option<String>,
    timestamp: Option<i64>,
    revision: Option<i64>,
}

impl File {
    /// Creates a new unclassified file for the given relative path.
    ///
    /// Paths are always `/`-separated, relative to the project root.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_type: FileType::Unclassified,
            targets: Vec::new(),
            removed: false,
            is_module: false,
            content: None,
            timestamp: None,
            revision: None,
        }
    }

    /// Creates a virtual module under the given module id.
    ///
    /// Virtual modules skip scanning, stat checks and the cache store
    /// entirely; their type and targets are whatever the caller declares.
    pub fn module(id: impl Into<String>, file_type: FileType, targets: Vec<Target>) -> Self {
        Self {
            path: id.into(),
            file_type,
            targets,
            removed: false,
            is_module: true,
            content: None,
            timestamp: None,
            revision: None,
        }
    }

    /// The relative path (or module id) identifying this file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolves the absolute path under the given project root.
    pub fn fullpath(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }

    /// The classified type of this file.
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Sets the classified type.
    pub fn set_type(&mut self, file_type: FileType) {
        self.file_type = file_type;
    }

    /// The classified targets of this file.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Replaces the target list.
    pub fn set_targets(&mut self, targets: Vec<Target>) {
        self.targets = targets;
    }

    /// Whether this file is intended for the given target.
    pub fn is_target(&self, target: Target) -> bool {
        self.targets.contains(&target)
    }

    /// Whether this entry has been tombstoned by a stat-miss.
    pub fn removed(&self) -> bool {
        self.removed
    }

    /// Tombstones or revives this entry.
    pub fn set_removed(&mut self, removed: bool) {
        self.removed = removed;
    }

    /// Whether this is a virtual module with no filesystem backing.
    pub fn is_module(&self) -> bool {
        self.is_module
    }

    /// The last transformed content, if any.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Stores the transformed content.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = Some(content.into());
    }

    /// The cached mtime in milliseconds since the epoch.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Records the mtime the cached content corresponds to.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = Some(timestamp);
    }

    /// The cache revision the registry entry was last synchronized with.
    pub fn revision(&self) -> Option<i64> {
        self.revision
    }

    /// Records the cache revision after a successful write.
    pub fn set_revision(&mut self, revision: i64) {
        self.revision = Some(revision);
    }

    /// Resets classification before a fresh transform pass.
    ///
    /// Type and targets must be a pure function of content, path and
    /// pipeline config, so every pass starts from a clean slate.
    pub fn reset_classification(&mut self) {
        self.file_type = FileType::Unclassified;
        self.targets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_is_unclassified() {
        let f = File::new("lib/a.js");
        assert_eq!(f.file_type(), FileType::Unclassified);
        assert!(f.targets().is_empty());
        assert!(!f.removed());
        assert!(!f.is_module());
    }

    #[test]
    fn test_module_keeps_declared_classification() {
        let m = File::module("presto-runtime/client", FileType::Script, vec![Target::Client]);
        assert!(m.is_module());
        assert_eq!(m.file_type(), FileType::Script);
        assert!(m.is_target(Target::Client));
        assert!(!m.is_target(Target::Server));
    }

    #[test]
    fn test_reset_classification() {
        let mut f = File::new("client/app.js");
        f.set_type(FileType::Script);
        f.set_targets(vec![Target::Client]);
        f.reset_classification();
        assert_eq!(f.file_type(), FileType::Unclassified);
        assert!(f.targets().is_empty());
    }
}
