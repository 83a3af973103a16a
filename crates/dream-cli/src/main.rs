mod bootstrap_helpers;
mod cli_args;
mod commands;

use anyhow::Result;
use clap::Parser;

use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    bootstrap_helpers::init_tracing(cli.verbose);
    commands::run_command(cli.command).await
}
