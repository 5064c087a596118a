//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Commands;

/// Command-line interface for supervising local llama-server instances.
#[derive(Parser)]
#[command(name = "llamactl")]
#[command(about = "Launch and supervise local llama-server instances")]
#[command(version)]
pub struct Cli {
    /// Path to the llama-server binary
    #[arg(long = "server-path", env = "LLAMACTL_SERVER_PATH", global = true)]
    pub server_path: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
