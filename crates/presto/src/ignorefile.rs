// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pattern-based path exclusion.
//!
//! [`IgnoreMatcher`] holds an ordered list of gitignore-style patterns.
//! Each pattern carries a base directory: patterns from a nested
//! `.prestoignore` apply only within that subtree and are appended after
//! the inherited parent patterns, so on conflicts the local file wins
//! (last match decides, like gitignore). Matchers merge by concatenating
//! their pattern lists in order.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::Match;

use crate::config::DEFAULT_EXCLUDES;
use crate::error::{Error, Result};

/// One ignore pattern and the directory it is scoped to.
///
/// An empty `base` means the pattern applies from the project root.
#[derive(Debug, Clone)]
struct ScopedPattern {
    base: PathBuf,
    line: String,
}

/// Consecutive same-base patterns compiled into one matcher.
#[derive(Debug, Clone)]
struct Group {
    base: PathBuf,
    gitignore: Gitignore,
}

/// Ordered, mergeable, per-directory-overridable exclusion patterns.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: PathBuf,
    patterns: Vec<ScopedPattern>,
    groups: Vec<Group>,
}

impl IgnoreMatcher {
    /// Creates an empty matcher rooted at the given project directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Creates a matcher preloaded with the built-in default excludes
    /// plus the given extra patterns.
    pub fn with_defaults<I, S>(root: impl Into<PathBuf>, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::new(root);
        for pattern in DEFAULT_EXCLUDES {
            matcher.add_pattern(pattern)?;
        }
        for pattern in extra {
            matcher.add_pattern(pattern.as_ref())?;
        }
        Ok(matcher)
    }

    /// The project root this matcher resolves paths against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of patterns held, in order.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the matcher holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Appends a root-scoped pattern.
    pub fn add_pattern(&mut self, line: &str) -> Result<()> {
        self.patterns.push(ScopedPattern {
            base: PathBuf::new(),
            line: line.to_string(),
        });
        self.recompile()
    }

    /// Reads an ignore file and appends its patterns, scoped to the
    /// file's directory.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let src = std::fs::read_to_string(path)?;
        let parent = path.parent().unwrap_or(&self.root);
        let base = parent
            .strip_prefix(&self.root)
            .unwrap_or(Path::new(""))
            .to_path_buf();
        for line in src.lines() {
            self.patterns.push(ScopedPattern {
                base: base.clone(),
                line: line.to_string(),
            });
        }
        self.recompile()
    }

    /// Returns a matcher holding `self`'s patterns followed by `other`'s.
    pub fn merge(&self, other: &IgnoreMatcher) -> Result<IgnoreMatcher> {
        let mut merged = IgnoreMatcher::new(self.root.clone());
        merged.patterns.extend(self.patterns.iter().cloned());
        merged.patterns.extend(other.patterns.iter().cloned());
        merged.recompile()?;
        Ok(merged)
    }

    /// Whether the given root-relative path is excluded.
    ///
    /// Parent directories are consulted too, so `node_modules` excludes
    /// everything beneath it. Whitelist (`!`) patterns re-include, and
    /// the last matching pattern decides.
    pub fn matched(&self, rel: impl AsRef<Path>, is_dir: bool) -> bool {
        let rel = rel.as_ref();
        let mut ignored = false;
        for group in &self.groups {
            let scoped = if group.base.as_os_str().is_empty() {
                rel
            } else {
                match rel.strip_prefix(&group.base) {
                    Ok(stripped) if !stripped.as_os_str().is_empty() => stripped,
                    _ => continue,
                }
            };
            match group.gitignore.matched_path_or_any_parents(scoped, is_dir) {
                Match::Ignore(_) => ignored = true,
                Match::Whitelist(_) => ignored = false,
                Match::None => {}
            }
        }
        ignored
    }

    /// Filters a list of relative file paths down to the non-excluded ones.
    pub fn filter<I, S>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        paths
            .into_iter()
            .map(Into::into)
            .filter(|p| !self.matched(p, false))
            .collect()
    }

    fn recompile(&mut self) -> Result<()> {
        let mut groups = Vec::new();
        let mut current: Option<(PathBuf, GitignoreBuilder)> = None;

        for pattern in &self.patterns {
            let start_new = current
                .as_ref()
                .map_or(true, |(base, _)| base != &pattern.base);
            if start_new {
                if let Some(group) = Self::finish_group(current.take())? {
                    groups.push(group);
                }
                current = Some((
                    pattern.base.clone(),
                    GitignoreBuilder::new(self.root.join(&pattern.base)),
                ));
            }
            if let Some((_, builder)) = current.as_mut() {
                builder
                    .add_line(None, &pattern.line)
                    .map_err(|e| Error::Scan(e.to_string()))?;
            }
        }
        if let Some(group) = Self::finish_group(current.take())? {
            groups.push(group);
        }

        self.groups = groups;
        Ok(())
    }

    fn finish_group(current: Option<(PathBuf, GitignoreBuilder)>) -> Result<Option<Group>> {
        let Some((base, builder)) = current else {
            return Ok(None);
        };
        let gitignore = builder.build().map_err(|e| Error::Scan(e.to_string()))?;
        Ok(Some(Group { base, gitignore }))
    }
}
