//! Configuration types.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which `Store` implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local maps; nothing survives the process.
    Memory,
    /// One JSON file per record under `json_file_path`.
    JsonFile,
    /// Document table in the SQLite file at `db_path` (default).
    #[default]
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "json_file" | "jsonfile" | "json" => Ok(StoreBackend::JsonFile),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(anyhow!(
                "Unknown store backend '{}'. Expected memory, json_file or sqlite.",
                other
            )),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory of the JSON file store.
    #[serde(default = "default_json_file_path")]
    pub json_file_path: PathBuf,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            json_file_path: default_json_file_path(),
            db_path: default_db_path(),
        }
    }
}

fn default_json_file_path() -> PathBuf {
    PathBuf::from("plan-graph/data")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("plan-graph/plans.db")
}

/// Defaults applied to newly created plans and tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Prefix of generated task ids.
    #[serde(default = "default_task_id_prefix")]
    pub task_id_prefix: String,

    /// Prefix of generated plan ids.
    #[serde(default = "default_plan_id_prefix")]
    pub plan_id_prefix: String,

    /// Agent id used when none is given.
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            task_id_prefix: default_task_id_prefix(),
            plan_id_prefix: default_plan_id_prefix(),
            agent_id: default_agent_id(),
        }
    }
}

fn default_task_id_prefix() -> String {
    "T".to_string()
}

fn default_plan_id_prefix() -> String {
    "PL".to_string()
}

fn default_agent_id() -> String {
    "default".to_string()
}

/// Run loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum tasks executed by one `Runner::run` call.
    #[serde(default = "default_max_cycles")]
    pub max_cycles: usize,

    /// Maximum executions of one task lineage, original included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_cycles() -> usize {
    100
}

fn default_max_attempts() -> u32 {
    3
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub plan: PlanConfig,

    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Ensure the directories the configured store writes to exist.
    pub fn ensure_store_dir(&self) -> Result<()> {
        match self.store.backend {
            StoreBackend::Memory => {}
            StoreBackend::JsonFile => std::fs::create_dir_all(&self.store.json_file_path)?,
            StoreBackend::Sqlite => {
                if let Some(parent) = self.store.db_path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(())
    }
}
