//! # tar-scm CLI
//!
//! Binary entry point for the `tar-scm` command-line tool. It parses the
//! arguments, sets up logging and hands over to the selected command; all
//! real work lives in the `tar_scm` library.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
