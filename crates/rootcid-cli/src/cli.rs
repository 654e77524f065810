use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rootcid",
    about = "Publish and resolve a JSON document anchored by a ledger root pointer",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Registry configuration file (TOML). Defaults to ./rootcid.toml if present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a JSON document and point the registry at it
    Publish(PublishArgs),
    /// Point the registry at a document that is already stored
    Commit(CommitArgs),
    /// Print the current document
    Resolve(ResolveArgs),
    /// Show the root pointer and whether its content is pinned
    Status(StatusArgs),
    /// Follow root pointer changes
    Watch(WatchArgs),
}

#[derive(Args)]
pub struct PublishArgs {
    /// JSON file to publish, or `-` for stdin
    pub file: PathBuf,
}

#[derive(Args)]
pub struct CommitArgs {
    /// Fingerprint reported by a publish that failed to commit
    pub fingerprint: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Print only the section at this JSON pointer (e.g. `/servers`)
    #[arg(long)]
    pub field: Option<String>,
}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct WatchArgs {
    /// First ledger block to report
    #[arg(long, default_value = "0")]
    pub from: u64,
}
