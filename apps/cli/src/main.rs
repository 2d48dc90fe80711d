//! webharvest CLI — local harvesting preview.
//!
//! Fetches pages, feeds, and sitemaps under the same polite-fetch
//! policy the plugin enforces, and prints the resulting records as
//! JSON. Attestation and scheduling stay on the plugin surface.

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
