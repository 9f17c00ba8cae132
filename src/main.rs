//! # scm-bridge CLI
//!
//! Binary entry point. Parses the command line, runs the library pipeline
//! and turns its errors into a non-zero exit status with a readable message.

mod cli;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
