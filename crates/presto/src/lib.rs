// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # presto
//!
//! Incremental build pipeline coupled to a live-reload process
//! supervisor.
//!
//! presto watches a source tree, classifies and transforms files,
//! produces bundled output artifacts (script bundle, stylesheet, server
//! entry, package manifest) and supervises the application's child
//! process — restarting it when server code changes and hot-notifying
//! it when only client code changed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use presto::{Compiler, Options, Runner, RunnerOptions};
//!
//! let compiler = Compiler::new(".", Options::default())?;
//! let watch = compiler.watch().await?;
//!
//! let runner = Runner::new(&compiler, RunnerOptions::default());
//! runner.attach(&compiler);
//! runner.start()?;
//! watch.wait().await;
//! ```

/// Per-path cache records with compare-and-swap writes.
pub mod cache;
/// The build orchestrator.
pub mod compiler;
/// Compiler options and `presto.toml`.
pub mod config;
/// Error types.
pub mod error;
/// Compiler lifecycle events.
pub mod events;
/// The file model.
pub mod file;
/// Pattern-based path exclusion.
pub mod ignorefile;
/// Parent/child IPC protocol.
pub mod ipc;
/// Project manifest access.
pub mod manifest;
/// Conservative production minification.
pub mod minify;
/// Output generators.
pub mod output;
/// Plugin loading.
pub mod plugin;
/// Child process supervision.
pub mod runner;
/// Directory traversal and scan ordering.
pub mod scan;
/// The transform pipeline.
pub mod transform;
/// Debounced filesystem watching.
pub mod watcher;

pub use compiler::{ArtifactSink, CompileOptions, Compiler, CompilerState, WatchHandle};
pub use config::Options;
pub use error::{Error, Result};
pub use events::{ChangeKind, ChangedFile, CompileSummary, CompilerEvent};
pub use file::{File, FileType, Target};
pub use ipc::IpcMessage;
pub use output::{Artifact, OutputContext, OutputGenerator};
pub use plugin::Plugin;
pub use runner::{Runner, RunnerEvent, RunnerOptions, RunnerState};
