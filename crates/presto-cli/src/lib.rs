// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI for presto.
//!
//! The CLI only instantiates [`presto::Compiler`] and [`presto::Runner`]
//! and maps their events to console output; all build semantics live in
//! the `presto` crate.

/// Subcommand implementations.
pub mod commands;
