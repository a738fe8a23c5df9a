//! Command-line surface for the `basekit` binary.
//!
//! Three commands cover the local workflow: `hash` canonicalizes a stored
//! document and prints its content id, `inspect` summarizes an object held
//! in a filesystem store, and `copy` moves a whole graph between stores.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "basekit",
    author,
    version,
    about = "Content-addressed object graphs: hash, inspect, copy",
    long_about = "Work with content-addressed object graphs in local stores.\n\n\
                  Documents are canonical JSON; ids are derived from the canonical\n\
                  form, so equal content always hashes to the same id."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (debug-level logging)
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Canonicalize a document file and print its content id
    Hash(HashCmd),

    /// Summarize an object held in a local store
    Inspect(InspectCmd),

    /// Copy an object graph from one local store to another
    Copy(CopyCmd),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Hash(_) => "hash",
            Commands::Inspect(_) => "inspect",
            Commands::Copy(_) => "copy",
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct HashCmd {
    /// Path to a JSON document; pass `-` to read stdin
    pub file: PathBuf,

    /// Fail when the document's embedded id disagrees with the computed one
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, clap::Args)]
pub struct InspectCmd {
    /// Content id of the object to inspect
    pub id: String,

    /// Store directory (defaults to the basekit home store)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Resolve the full closure instead of the single document
    #[arg(long)]
    pub deep: bool,
}

#[derive(Debug, clap::Args)]
pub struct CopyCmd {
    /// Content id of the root object to copy
    pub id: String,

    /// Source store directory
    #[arg(long, value_name = "DIR")]
    pub from: PathBuf,

    /// Destination store directory
    #[arg(long, value_name = "DIR")]
    pub to: PathBuf,

    /// Copy the root document only, leaving references unresolved
    #[arg(long)]
    pub shallow: bool,
}

/// Default object store location, honoring `BASEKIT_HOME`.
pub fn default_store() -> PathBuf {
    std::env::var("BASEKIT_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("basekit")
        })
        .join("objects")
}
