//! Bellgrid CLI: weekly class-schedule PDFs in, dated class periods out.
//!
//! Finds the schedule PDFs a school publishes, reads each week's grid, and
//! keeps the resulting periods in a local database.

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
