// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching.
//!
//! Wraps `notify` behind a debouncer so bursts of change events arrive
//! as one batch per debounce window. Events are filtered down to
//! qualifying paths before they reach the compiler's watch loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, RecommendedCache};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::events::ChangeKind;

/// One qualifying filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// What happened.
    pub kind: ChangeKind,
    /// Root-relative `/`-separated path.
    pub path: String,
}

/// Keepalive guard for an active watch; dropping it stops notify.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Watches `root` recursively.
    ///
    /// `filter` decides which root-relative paths qualify; everything
    /// else is dropped before batching. Returns the guard plus the
    /// channel batches arrive on, one batch per debounce window.
    pub fn new<F>(
        root: &Path,
        debounce: Duration,
        filter: F,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<Change>>)>
    where
        F: Fn(&str) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let base = root.to_path_buf();

        let mut debouncer = new_debouncer(
            debounce,
            None,
            move |result: std::result::Result<Vec<DebouncedEvent>, Vec<notify::Error>>| {
                let Ok(events) = result else {
                    return;
                };

                let mut changes = Vec::new();
                for event in &events {
                    let Some(kind) = map_kind(&event.event.kind) else {
                        continue;
                    };
                    for path in &event.event.paths {
                        let Some(rel) = relative(&base, path) else {
                            continue;
                        };
                        if filter(&rel) {
                            changes.push(Change { kind, path: rel });
                        }
                    }
                }

                if !changes.is_empty() {
                    let _ = tx.send(changes);
                }
            },
        )
        .map_err(|e| Error::Watch(e.to_string()))?;

        debouncer
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watch(e.to_string()))?;

        Ok((Self { _debouncer: debouncer }, rx))
    }
}

fn map_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Add),
        EventKind::Modify(_) => Some(ChangeKind::Modify),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        _ => None,
    }
}

fn relative(base: &Path, path: &PathBuf) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let s = rel.to_string_lossy();
    if s.is_empty() {
        return None;
    }
    if std::path::MAIN_SEPARATOR == '/' {
        Some(s.into_owned())
    } else {
        Some(s.replace(std::path::MAIN_SEPARATOR, "/"))
    }
}
