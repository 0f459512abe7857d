// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

/// One-shot compile.
pub mod build;
/// Build directory cleanup.
pub mod clean;
/// Development server with live reload.
pub mod dev;
/// Production packaging.
pub mod pack;
