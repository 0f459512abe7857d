// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Production packaging.

use std::path::Path;
use std::time::Instant;

use console::style;
use presto::{Compiler, Options};

/// Builds in production mode and packs the artifacts into a tarball.
pub async fn run(dir: &str, out: Option<&str>, quiet: bool) -> anyhow::Result<()> {
    let compiler = Compiler::new(
        dir,
        Options {
            production: true,
            ..Options::default()
        },
    )?;

    let start = Instant::now();
    let tarball = compiler.pack(out.map(Path::new)).await?;

    if !quiet {
        println!(
            "  {} {} {}",
            style("✓").green(),
            style(tarball.display()).dim(),
            style(format!("{}ms", start.elapsed().as_millis())).dim()
        );
    }
    Ok(())
}
