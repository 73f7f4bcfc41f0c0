//! CLI commands and argument parsing.

pub mod check;

use clap::{Parser, Subcommand};

/// Regwatch - discovers new versions of container images
#[derive(Parser)]
#[command(name = "regwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Check a repository for versions newer than the cursor
    Check(check::CheckArgs),

    /// Print version information
    Version,
}
