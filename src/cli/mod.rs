//! CLI command definitions for plan-graph.
//!
//! The main entry point is the `Cli` struct; every subcommand loads a plan
//! from the configured store, applies one operation and saves it back.

pub mod export;
pub mod import;

use crate::config::StoreBackend;
use crate::format::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use export::ExportArgs;
use import::ImportArgs;

/// Store backend selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreArg {
    Memory,
    JsonFile,
    Sqlite,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Memory => StoreBackend::Memory,
            StoreArg::JsonFile => StoreBackend::JsonFile,
            StoreArg::Sqlite => StoreBackend::Sqlite,
        }
    }
}

/// Task graph planner for autonomous agents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Store backend (overrides config)
    #[arg(long, value_enum, global = true)]
    pub store: Option<StoreArg>,

    /// JSON file store directory (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Path to SQLite database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Agent owning the plans (overrides config)
    #[arg(short, long, global = true)]
    pub agent: Option<String>,

    /// Output format for show/next: markdown or json
    #[arg(short, long, default_value = "markdown", global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a plan and print its id
    New {
        /// Root goal of the plan
        goal: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// List plan ids for the agent
    List,

    /// Add a top-level task
    Add(AddArgs),

    /// Add a subtask under an existing task
    Subtask {
        #[command(flatten)]
        add: AddArgs,
        /// Parent task id
        #[arg(long)]
        parent: String,
    },

    /// Make PREDECESSOR a predecessor of TASK
    Link {
        plan: String,
        task: String,
        predecessor: String,
    },

    /// Show the plan tree, or one task
    Show {
        plan: String,
        task: Option<String>,
        /// Tree depth (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        depth: usize,
    },

    /// Print the next task to work on
    Next {
        plan: String,
        /// Task just worked on
        #[arg(long)]
        after: Option<String>,
    },

    /// Mark a task IN_PROGRESS
    Start { plan: String, task: String },

    /// Close a task, optionally recording its output
    Close {
        plan: String,
        task: String,
        #[arg(long)]
        output: Option<String>,
    },

    /// Retry a task by cloning it to the front of the ready queue
    Retry { plan: String, task: String },

    /// Move a task to the front of the ready queue
    Prioritize { plan: String, task: String },

    /// Export a plan snapshot
    Export(ExportArgs),

    /// Import a plan snapshot
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    pub plan: String,
    pub goal: String,

    /// Explicit task id (generated otherwise)
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Predecessor task ids
    #[arg(long, value_delimiter = ',')]
    pub after: Vec<String>,

    /// Queue the task if its predecessors are done
    #[arg(long)]
    pub ready: bool,
}
