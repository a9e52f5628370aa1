//! Binary crate for the `greeter` service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Serving the greeting endpoint over HTTP
//! - Interactive configuration

use clap::Parser;

mod cli;
mod http;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let cmd = cli::Cli::parse();
    logging::init(cmd.verbose);
    cmd.run().await
}
