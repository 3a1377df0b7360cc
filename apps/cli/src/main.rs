//! refconv CLI: NGINX XML documentation to a JSON directive catalog.
//!
//! Downloads the documentation sources, converts every module page to
//! Markdown and HTML, and writes one catalog file.

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
