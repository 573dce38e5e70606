// src/cli.rs

//! CLI argument parsing using `clap`.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::engine::DEFAULT_SHELL;

/// Command-line arguments for `catapply`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "catapply",
    version,
    about = "Apply a catalog of declarative system resources.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the catalog. Read from stdin when omitted.
    #[arg(value_name = "CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Maximum number of resources to apply simultaneously.
    #[arg(short, long, value_name = "N", default_value = "1")]
    pub jobs: NonZeroUsize,

    /// Dry-run: decide what would change without mutating the host.
    #[arg(short = 'n', long)]
    pub simulate: bool,

    /// Log each mutating operation in shell notation.
    #[arg(short = 's', long)]
    pub show_commands: bool,

    /// Shell interpreter used for script-form exec resources.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CATAPPLY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Suppress informational messages.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
