//! Bibliothek CLI: register CI builds and their artifacts.
//!
//! Uploads build outputs to the blob store and records the build, with its
//! changelog, in the catalog.

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
