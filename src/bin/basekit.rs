//! basekit: content-addressed object graphs on the command line.
//!
//! ## Example Usage
//!
//! ```bash
//! # Print the content id of a stored document
//! basekit hash ./mesh.json
//!
//! # Summarize an object in a local store
//! basekit inspect 19c00f2e6c5b8c3b8f6d0f0c9b1a2d3e --store ./objects --deep
//!
//! # Copy a whole graph between stores
//! basekit copy 19c00f2e6c5b8c3b8f6d0f0c9b1a2d3e --from ./objects --to ./backup
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use basekit::args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();

    // Human output goes to stdout; logs stay on stderr and stay quiet
    // unless asked for.
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::debug!(command = command.name(), "dispatching");

    match command {
        Commands::Hash(cmd) => cmd.execute(json),
        Commands::Inspect(cmd) => cmd.execute(json).await,
        Commands::Copy(cmd) => cmd.execute(json).await,
    }
}
