//! EventGraph CLI: crawl the current-events portal and emit knowledge graphs.
//!
//! Loads configuration, sets up tracing and hands off to the run controller.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
