// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build directory cleanup.

use console::style;
use presto::{Compiler, Options};

/// Empties the build directory, or removes it entirely with `--destroy`.
pub async fn run(dir: &str, destroy: bool) -> anyhow::Result<()> {
    let compiler = Compiler::new(dir, Options::default())?;
    if destroy {
        compiler.destroy().await?;
        println!(
            "  {} {}",
            style("✓").green(),
            style("build directory removed").dim()
        );
    } else {
        compiler.clear().await?;
        println!(
            "  {} {}",
            style("✓").green(),
            style("build directory emptied").dim()
        );
    }
    Ok(())
}
