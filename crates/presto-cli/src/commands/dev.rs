// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development mode: watch, rebuild, supervise.

use std::time::Instant;

use console::style;
use presto::{Compiler, CompilerEvent, Options, Runner, RunnerEvent, RunnerOptions};
use tokio::sync::broadcast;

/// Runs the watch loop and the supervised application process.
pub async fn run(dir: &str, args: Vec<String>, quiet: bool) -> anyhow::Result<()> {
    let compiler = Compiler::new(dir, Options::default())?;
    let mut compiler_events = compiler.subscribe();

    let runner = Runner::new(&compiler, RunnerOptions { command: None, args });
    let mut runner_events = runner.subscribe();
    let _bridge = runner.attach(&compiler);

    let watch = compiler.watch().await?;
    if !quiet {
        println!(
            "{} {}",
            style("Status:").cyan(),
            style("watching for changes...").dim()
        );
    }

    let mut started = false;
    let mut build_start = Instant::now();

    loop {
        tokio::select! {
            event = compiler_events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                match event {
                    CompilerEvent::PreTransform => {
                        build_start = Instant::now();
                    }
                    CompilerEvent::Compile { summary } => {
                        if !quiet {
                            println!(
                                "  {} {} {}",
                                style("✓").green(),
                                style(format!(
                                    "build #{} ({} changed)",
                                    summary.seq,
                                    summary.changed.len()
                                ))
                                .dim(),
                                style(format!("{}ms", build_start.elapsed().as_millis()))
                                    .dim()
                            );
                        }
                        // the child starts after the first successful build
                        if !started {
                            started = true;
                            runner.start()?;
                        }
                    }
                    CompilerEvent::Error { message } => {
                        eprintln!("  {} {}", style("✗").red(), style(message).red());
                    }
                    _ => {}
                }
            }
            event = runner_events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if quiet {
                    continue;
                }
                match event {
                    RunnerEvent::Ready { address } => {
                        println!(
                            "{} {}",
                            style("Server:").cyan(),
                            style(format!("http://{}", address)).green().bold()
                        );
                    }
                    RunnerEvent::Restart => {
                        println!("  {}", style("restarting...").dim());
                    }
                    RunnerEvent::Exit { code } => {
                        if let Some(code) = code.filter(|c| *c != 0) {
                            eprintln!(
                                "  {} {}",
                                style("✗").red(),
                                style(format!("server exited with code {}", code)).red()
                            );
                        }
                    }
                    RunnerEvent::Error { message } => {
                        eprintln!("  {} {}", style("✗").red(), style(message).red());
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    runner.kill().await;
    watch.stop();
    Ok(())
}
