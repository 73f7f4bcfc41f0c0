//! Regwatch CLI - reports new versions of a container image repository.

use anyhow::Result;
use clap::Parser;

mod commands;
mod logging;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => commands::check::run(&args).await,
        Commands::Version => {
            println!("regwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
