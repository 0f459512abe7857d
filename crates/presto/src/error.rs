// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the presto build pipeline.
//!
//! This module defines [`Error`], the main error enum, shared by the
//! compiler, the cache store and the runner.
//!
//! # Error Categories
//!
//! - **Project errors**: the directory is not a presto project
//! - **Plugin errors**: a declared plugin failed to resolve or load
//! - **Transform errors**: one file's pipeline stage failed (isolated)
//! - **Output errors**: an output generator failed (aborts the compile)
//! - **Process errors**: the supervised child failed to spawn or exited badly
//! - **Cache errors**: storage failures and lost compare-and-swap races

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for presto operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The given directory is not a recognized presto project.
    #[error("not a presto project: {}", .0.display())]
    NotAProject(PathBuf),

    /// The compiler was asked to compile before `setup()` completed.
    #[error("compiler has not been set up")]
    NotSetup,

    /// A declared plugin failed to resolve or load.
    #[error("plugin '{name}' failed to load: {reason}")]
    PluginLoad {
        /// The dependency name the plugin was declared under.
        name: String,
        /// Why resolution or registration failed.
        reason: String,
    },

    /// A transform stage failed for a single file.
    #[error("transform failed for '{path}': {message}")]
    Transform {
        /// The file the failure is attributed to.
        path: String,
        /// The stage's error message.
        message: String,
    },

    /// An output generator failed.
    #[error("output '{name}' failed: {message}")]
    Output {
        /// The registered name of the generator.
        name: String,
        /// The generator's error message.
        message: String,
    },

    /// The supervised child process failed.
    #[error("child process error: {0}")]
    Process(String),

    /// A compare-and-swap cache write lost a race against another writer.
    #[error("cache conflict for '{0}': record was modified concurrently")]
    CacheConflict(String),

    /// A cache storage operation failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// Invalid or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem watching failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// Directory traversal or ignore-pattern compilation failed.
    #[error("scan error: {0}")]
    Scan(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
