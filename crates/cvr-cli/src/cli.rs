use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cvr_core::StrategyKind;
use cvr_types::Bump;

#[derive(Parser)]
#[command(
    name = "cvr",
    about = "Contract Version Registry: semantic versions for contract deployments",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Server configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the registry HTTP server
    Serve(ServeArgs),
    /// Offline version arithmetic
    #[command(subcommand)]
    Version(VersionCommand),
    /// Print the effective server configuration
    Config(ServeArgs),
}

/// Overrides applied on top of the configuration file.
#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<String>,
    /// embedded | content_addressed
    #[arg(long)]
    pub strategy: Option<StrategyKind>,
    /// Record log path (in-memory when unset)
    #[arg(long)]
    pub records: Option<PathBuf>,
    /// Payload store directory (in-memory when unset)
    #[arg(long)]
    pub payloads: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum VersionCommand {
    /// Compute the version that follows CURRENT (baseline when omitted)
    Next {
        current: Option<String>,
        #[arg(short, long, default_value = "patch")]
        bump: Bump,
    },
    /// Compare two versions
    Compare { a: String, b: String },
    /// Statistics over a list of versions; unparseable entries are skipped
    Stats { versions: Vec<String> },
}
