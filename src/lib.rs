//! Plan Graph Library
//!
//! Task graphs for autonomous agents: a `Plan` owns a goal's tasks, keeps a
//! ready queue in step with predecessor and subtask completion, and persists
//! itself through a pluggable `Store`. A `Runner` drives a plan to
//! completion with a caller-supplied `TaskExecutor`.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod plan;
pub mod runner;
pub mod stack;
pub mod task;
pub mod types;

pub use error::{ErrorCode, PlanError, PlanResult};
pub use plan::Plan;
pub use runner::{ExecutionOutcome, RunSummary, Runner, TaskExecutor};
pub use stack::TaskStack;
pub use task::Task;
pub use types::TaskStatus;
