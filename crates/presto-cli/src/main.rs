// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use presto_cli::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "presto")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Incremental builds with live reload", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Quiet mode: only show errors (useful for CI)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch, rebuild and run the application with live reload
    Dev {
        /// Project directory
        #[arg(default_value = ".")]
        dir: String,
        /// Arguments passed through to the application process
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Compile the project once
    Build {
        /// Project directory
        #[arg(default_value = ".")]
        dir: String,
        /// Build minified production artifacts
        #[arg(short, long)]
        production: bool,
    },
    /// Produce a production tarball
    Pack {
        /// Project directory
        #[arg(default_value = ".")]
        dir: String,
        /// Directory to write the tarball into
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Empty the build directory
    Clean {
        /// Project directory
        #[arg(default_value = ".")]
        dir: String,
        /// Remove the build directory entirely
        #[arg(long)]
        destroy: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Dev { dir, args } => commands::dev::run(&dir, args, cli.quiet).await,
        Commands::Build { dir, production } => {
            commands::build::run(&dir, production, cli.quiet).await
        }
        Commands::Pack { dir, out } => commands::pack::run(&dir, out.as_deref(), cli.quiet).await,
        Commands::Clean { dir, destroy } => commands::clean::run(&dir, destroy).await,
    }
}
