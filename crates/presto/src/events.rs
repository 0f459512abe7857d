// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiler lifecycle events.
//!
//! A fixed enum of named phases on a broadcast channel — deliberately
//! not a generic pub/sub bus. Every compile emits its phases in order;
//! subscribers see them in that order.

use tokio::sync::broadcast;

use crate::file::Target;

/// One changed file in a completed build.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    /// Registry path of the file.
    pub path: String,
    /// Targets the file resolved to after the transform pass.
    pub targets: Vec<Target>,
}

/// Summary of one completed compile.
#[derive(Debug, Clone)]
pub struct CompileSummary {
    /// Monotonically increasing build sequence number.
    pub seq: u64,
    /// Whether this was a full (forced) build.
    pub full: bool,
    /// Files whose transformed content changed in this build.
    pub changed: Vec<ChangedFile>,
}

impl CompileSummary {
    /// Whether any changed file carries the given target.
    pub fn touches(&self, target: Target) -> bool {
        self.changed.iter().any(|f| f.targets.contains(&target))
    }
}

/// Lifecycle events emitted by the compiler.
#[derive(Debug, Clone)]
pub enum CompilerEvent {
    /// `setup()` completed.
    Setup,
    /// A qualifying filesystem event was observed in watch mode.
    Change {
        /// What happened to the path.
        kind: ChangeKind,
        /// Root-relative path.
        path: String,
    },
    /// The transform step is about to run.
    PreTransform,
    /// The transform step finished; carries the changed-file list.
    PostTransform {
        /// Paths whose transformed content changed.
        changed: Vec<String>,
    },
    /// Tombstoned files were evicted from the registry.
    Removed {
        /// The evicted paths.
        paths: Vec<String>,
    },
    /// Output generation is about to run.
    PreOutput,
    /// Artifacts were committed.
    PostOutput {
        /// Artifact paths that were written.
        paths: Vec<String>,
    },
    /// A compile completed successfully.
    Compile {
        /// What the build changed.
        summary: CompileSummary,
    },
    /// A compile or setup step failed.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

/// What a watch event did to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The path appeared.
    Add,
    /// The path's content changed.
    Modify,
    /// The path disappeared.
    Remove,
}

/// Broadcast hub for [`CompilerEvent`]s.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<CompilerEvent>,
}

impl EventHub {
    /// Creates a hub with a bounded backlog.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CompilerEvent> {
        self.tx.subscribe()
    }

    /// Emits an event. Events without subscribers are dropped silently.
    pub fn emit(&self, event: CompilerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
