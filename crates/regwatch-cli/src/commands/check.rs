//! Check command implementation.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use regwatch_check::Checker;
use regwatch_core::{CheckRequest, CheckResponse};

use crate::logging;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Read the request from this file instead of stdin
    #[arg(long, env = "REGWATCH_REQUEST")]
    pub request: Option<PathBuf>,
}

/// Runs the check command.
pub async fn run(args: &CheckArgs) -> Result<()> {
    let request = match &args.request {
        Some(path) => read_request_file(path)?,
        None => read_request(io::stdin().lock()).context("failed to read request from stdin")?,
    };

    logging::init(request.source.debug);
    debug!(repository = %request.source.repository, "Request decoded");

    let versions = Checker::new().check(&request).await?;

    write_response(io::stdout().lock(), &versions).context("failed to write response")
}

fn read_request_file(path: &Path) -> Result<CheckRequest> {
    let file =
        File::open(path).with_context(|| format!("failed to open request {}", path.display()))?;
    read_request(BufReader::new(file))
        .with_context(|| format!("failed to read request from {}", path.display()))
}

fn read_request(reader: impl Read) -> Result<CheckRequest> {
    Ok(CheckRequest::from_reader(reader)?)
}

fn write_response(mut writer: impl Write, versions: &CheckResponse) -> Result<()> {
    serde_json::to_writer(&mut writer, versions)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
