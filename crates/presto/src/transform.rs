// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The per-file transform pipeline.
//!
//! Stages are plain synchronous functions — one committed calling
//! convention for everything that plugs into the pipeline. A stage may
//! reclassify the file, rewrite its source (by returning `Some(new)`), or
//! leave both untouched (`None`). Stages run strictly in registration
//! order, sequentially per file; a file marked removed short-circuits the
//! remaining stages.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::file::{File, FileType, Target};

/// A single pipeline stage.
///
/// Returns `Some(text)` to replace the working source for later stages,
/// `None` to leave it unchanged.
pub type Stage = dyn Fn(&mut File, &str) -> Result<Option<String>> + Send + Sync;

/// Ordered list of transform stages.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    stages: Vec<Arc<Stage>>,
}

impl TransformPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline preloaded with the default classifiers.
    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        pipeline.push(classify_script);
        pipeline.push(classify_style);
        pipeline.push(classify_target);
        pipeline
    }

    /// Appends a stage.
    pub fn push<F>(&mut self, stage: F)
    where
        F: Fn(&mut File, &str) -> Result<Option<String>> + Send + Sync + 'static,
    {
        self.stages.push(Arc::new(stage));
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stages are registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage over the file, in order.
    ///
    /// Classification starts from a clean slate so the result is a pure
    /// function of content, path and pipeline config. Errors are
    /// attributed to the file's path.
    pub fn run(&self, file: &mut File, source: String) -> Result<String> {
        file.reset_classification();
        let mut src = source;
        for stage in &self.stages {
            if file.removed() {
                break;
            }
            let out = (**stage)(file, &src).map_err(|e| Error::Transform {
                path: file.path().to_string(),
                message: e.to_string(),
            })?;
            if let Some(next) = out {
                src = next;
            }
        }
        Ok(src)
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

fn extension(path: &str) -> &str {
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .unwrap_or("")
}

/// Default stage: `.js` files are scripts.
pub fn classify_script(file: &mut File, _src: &str) -> Result<Option<String>> {
    if extension(file.path()) == "js" {
        file.set_type(FileType::Script);
    }
    Ok(None)
}

/// Default stage: `.css` files are styles.
pub fn classify_style(file: &mut File, _src: &str) -> Result<Option<String>> {
    if extension(file.path()) == "css" {
        file.set_type(FileType::Style);
    }
    Ok(None)
}

lazy_static! {
    static ref CLIENT_NAME: Regex = Regex::new(r"(?i)(^|\.)client\.").unwrap();
    static ref SERVER_NAME: Regex = Regex::new(r"(?i)(^|\.)server\.").unwrap();
}

/// Default stage: a `client` path segment or `client.*`/`*.client.*`
/// file name marks a file client-only; same for `server`; neither marks
/// it for both targets.
pub fn classify_target(file: &mut File, _src: &str) -> Result<Option<String>> {
    let segments: Vec<&str> = file.path().split('/').collect();
    let name = segments.last().copied().unwrap_or("");

    let mut targets = Vec::new();
    if segments.contains(&"client") || CLIENT_NAME.is_match(name) {
        targets.push(Target::Client);
    }
    if segments.contains(&"server") || SERVER_NAME.is_match(name) {
        targets.push(Target::Server);
    }
    if targets.is_empty() {
        targets = vec![Target::Client, Target::Server];
    }

    file.set_targets(targets);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(path: &str, src: &str) -> File {
        let pipeline = TransformPipeline::with_defaults();
        let mut file = File::new(path);
        pipeline.run(&mut file, src.to_string()).unwrap();
        file
    }

    #[test]
    fn test_js_is_script_for_both_targets() {
        let f = run("lib/a.js", "var a;");
        assert_eq!(f.file_type(), FileType::Script);
        assert_eq!(f.targets(), &[Target::Client, Target::Server]);
    }

    #[test]
    fn test_css_under_client_dir_is_client_style() {
        let f = run("client/site.css", "body {}");
        assert_eq!(f.file_type(), FileType::Style);
        assert_eq!(f.targets(), &[Target::Client]);
    }

    #[test]
    fn test_filename_markers() {
        assert_eq!(run("api.server.js", "").targets(), &[Target::Server]);
        assert_eq!(run("client.boot.js", "").targets(), &[Target::Client]);
        assert_eq!(
            run("deep/server/handler.js", "").targets(),
            &[Target::Server]
        );
    }

    #[test]
    fn test_unknown_extension_is_unclassified() {
        let f = run("README.md", "# hi");
        assert_eq!(f.file_type(), FileType::Unclassified);
    }

    #[test]
    fn test_stages_run_in_order_and_rewrites_chain() {
        let mut pipeline = TransformPipeline::new();
        pipeline.push(|_f, src| Ok(Some(format!("{}1", src))));
        pipeline.push(|_f, src| Ok(Some(format!("{}2", src))));
        let mut file = File::new("x.js");
        let out = pipeline.run(&mut file, "s".to_string()).unwrap();
        assert_eq!(out, "s12");
    }

    #[test]
    fn test_removed_file_short_circuits() {
        let mut pipeline = TransformPipeline::new();
        pipeline.push(|f: &mut File, _src: &str| {
            f.set_removed(true);
            Ok(None)
        });
        pipeline.push(|_f, _src| -> Result<Option<String>> {
            panic!("stage after removal must not run");
        });
        let mut file = File::new("x.js");
        pipeline.run(&mut file, String::new()).unwrap();
        assert!(file.removed());
    }

    #[test]
    fn test_stage_error_is_attributed_to_the_file() {
        let mut pipeline = TransformPipeline::new();
        pipeline.push(|_f, _src| Err(Error::Config("boom".into())));
        let mut file = File::new("bad.js");
        let err = pipeline.run(&mut file, String::new()).unwrap_err();
        match err {
            Error::Transform { path, .. } => assert_eq!(path, "bad.js"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reclassification_is_deterministic() {
        let a = run("client/site.css", "body {}");
        let b = run("client/site.css", "body {}");
        assert_eq!(a.file_type(), b.file_type());
        assert_eq!(a.targets(), b.targets());
    }
}
