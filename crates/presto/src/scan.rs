// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ignore-aware directory traversal with deterministic ordering.
//!
//! The scan order is a pure function of the path set, independent of the
//! underlying directory-listing order. Library code sorts first so it
//! registers before its consumers; entry points sort last so everything
//! they reference already exists.

use std::cmp::Ordering;
use std::path::Path;

use ignore::WalkBuilder;

use crate::config::IGNORE_FILENAME;
use crate::error::{Error, Result};
use crate::ignorefile::IgnoreMatcher;

/// Recursively lists all non-ignored files under `root`.
///
/// Nested `.prestoignore` files are honored per-directory during the
/// walk; `matcher` carries the built-in defaults, configured patterns and
/// the root ignore file. The result is relative, `/`-separated and in
/// scan order.
pub fn scan(root: &Path, matcher: &IgnoreMatcher) -> Result<Vec<String>> {
    let filter_matcher = matcher.clone();
    let filter_root = root.to_path_buf();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .add_custom_ignore_filename(IGNORE_FILENAME)
        .filter_entry(move |entry| {
            let Ok(rel) = entry.path().strip_prefix(&filter_root) else {
                return true;
            };
            if rel.as_os_str().is_empty() {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !filter_matcher.matched(rel, is_dir)
        })
        .build();

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| Error::Scan(e.to_string()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Scan(e.to_string()))?;
        paths.push(rel_str(rel));
    }

    Ok(sort_paths(paths))
}

/// Re-evaluates a single relative path against the scan rules, for
/// filtering watcher events.
///
/// Applies the root matcher plus any `.prestoignore` files found on the
/// path's ancestry, the same rules `scan` applies during traversal.
pub fn is_watchable(root: &Path, matcher: &IgnoreMatcher, rel: &str) -> bool {
    if rel.is_empty() || rel.starts_with("../") || rel == ".." {
        return false;
    }

    let mut effective = matcher.clone();
    let segments: Vec<&str> = rel.split('/').collect();
    let mut dir = root.to_path_buf();
    let root_igfile = dir.join(IGNORE_FILENAME);
    if root_igfile.is_file() && effective.add_file(&root_igfile).is_err() {
        return false;
    }
    for segment in &segments[..segments.len().saturating_sub(1)] {
        dir.push(segment);
        let igfile = dir.join(IGNORE_FILENAME);
        if igfile.is_file() && effective.add_file(&igfile).is_err() {
            return false;
        }
    }

    !effective.matched(rel, false)
}

/// Sorts paths into scan order.
pub fn sort_paths(mut paths: Vec<String>) -> Vec<String> {
    paths.sort_by(|a, b| compare_paths(a, b));
    paths
}

/// Scan-order comparator over relative `/`-separated paths.
///
/// Order: lib entries first, main entries last, deeper paths before
/// shallower, lexicographic tiebreak.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    let a_segs: Vec<&str> = a.split('/').collect();
    let b_segs: Vec<&str> = b.split('/').collect();

    // main files are always last
    let a_main = is_main(&a_segs);
    let b_main = is_main(&b_segs);
    if a_main != b_main {
        return if a_main { Ordering::Greater } else { Ordering::Less };
    }

    // lib entries are always first
    let a_lib = is_lib(&a_segs);
    let b_lib = is_lib(&b_segs);
    if a_lib != b_lib {
        return if a_lib { Ordering::Less } else { Ordering::Greater };
    }

    // deeper paths before shallower
    match b_segs.len().cmp(&a_segs.len()) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

fn is_main(segments: &[&str]) -> bool {
    segments.last().is_some_and(|name| name.starts_with("main."))
}

fn is_lib(segments: &[&str]) -> bool {
    segments.iter().any(|s| *s == "lib")
        || segments.last().is_some_and(|name| name.starts_with("lib."))
}

fn rel_str(rel: &Path) -> String {
    let s = rel.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_sort_lib_first_main_last() {
        let sorted = sort_paths(vec![
            "lib/a.js".to_string(),
            "main.js".to_string(),
            "b/c.js".to_string(),
        ]);
        assert_eq!(sorted, vec!["lib/a.js", "b/c.js", "main.js"]);
    }

    #[test]
    fn test_sort_is_independent_of_input_order() {
        let paths = vec![
            "main.js",
            "lib/deep/x.js",
            "lib/a.js",
            "a/b/c.js",
            "z.js",
            "a/main.css",
        ];
        let forward = sort_paths(paths.iter().map(|s| s.to_string()).collect());
        let mut reversed: Vec<String> = paths.iter().rev().map(|s| s.to_string()).collect();
        reversed = sort_paths(reversed);
        assert_eq!(forward, reversed);
        assert_eq!(
            forward,
            vec!["lib/deep/x.js", "lib/a.js", "a/b/c.js", "z.js", "a/main.css", "main.js"]
        );
    }

    #[test]
    fn test_deeper_paths_sort_before_shallower() {
        let sorted = sort_paths(vec!["a.js".to_string(), "x/y/z.js".to_string()]);
        assert_eq!(sorted, vec!["x/y/z.js", "a.js"]);
    }

    #[test]
    fn test_lib_prefixed_filename_counts_as_lib() {
        let sorted = sort_paths(vec!["aaa.js".to_string(), "lib.util.js".to_string()]);
        assert_eq!(sorted, vec!["lib.util.js", "aaa.js"]);
    }

    #[test]
    fn test_scan_honors_matcher_and_nested_ignore_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "lib/a.js");
        touch(root, "main.js");
        touch(root, "b/c.js");
        touch(root, "b/skip.js");
        touch(root, "node_modules/pkg/index.js");
        std::fs::write(root.join("b").join(IGNORE_FILENAME), "skip.js\n").unwrap();

        let matcher = IgnoreMatcher::with_defaults(root, Vec::<String>::new()).unwrap();
        let paths = scan(root, &matcher).unwrap();
        assert_eq!(paths, vec!["lib/a.js", "b/c.js", "main.js"]);
    }

    #[test]
    fn test_is_watchable_applies_nested_ignores() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "b/skip.js");
        std::fs::write(root.join("b").join(IGNORE_FILENAME), "skip.js\n").unwrap();

        let matcher = IgnoreMatcher::with_defaults(root, Vec::<String>::new()).unwrap();
        assert!(!is_watchable(root, &matcher, "b/skip.js"));
        assert!(is_watchable(root, &matcher, "b/keep.js"));
        assert!(!is_watchable(root, &matcher, "node_modules/pkg/index.js"));
        assert!(!is_watchable(root, &matcher, "../outside.js"));
    }
}
