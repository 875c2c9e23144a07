//! Import subcommand: load a plan snapshot into the configured store.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot file (plain JSON or gzip)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Validate the snapshot without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Store the plan under this agent instead of the one in the snapshot
    #[arg(long, value_name = "AGENT")]
    pub as_agent: Option<String>,
}
