// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! One-shot full build.

use std::time::Instant;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use presto::{Compiler, Options};

/// Compiles the project once and reports the artifacts.
pub async fn run(dir: &str, production: bool, quiet: bool) -> anyhow::Result<()> {
    let compiler = Compiler::new(
        dir,
        Options {
            production,
            ..Options::default()
        },
    )?;

    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .expect("static template"),
        );
        pb.set_message("compiling");
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(pb)
    };

    let start = Instant::now();
    let result = compiler.flush().await;
    if let Some(pb) = &spinner {
        pb.finish_and_clear();
    }
    let summary = result?;

    if !quiet {
        println!(
            "  {} {} {}",
            style("✓").green(),
            style(format!("build #{} ({} files)", summary.seq, compiler.files().len())).dim(),
            style(format!("{}ms", start.elapsed().as_millis())).dim()
        );
        println!(
            "{} {}",
            style("Output:").cyan(),
            style(compiler.build_dir().display()).dim()
        );
    }
    Ok(())
}
