//! Configuration.
//!
//! Tiers, lowest to highest priority, merged field by field:
//! 1. **Defaults** compiled into `Config::default()`
//! 2. **Project** `$CWD/plan-graph/config.yaml`
//! 3. **User** `~/.plan-graph/config.yaml`
//! 4. **Environment** variables
//!
//! ## Environment Variables
//! - `PLAN_GRAPH_CONFIG_PATH` - Explicit config file (skips the file tiers)
//! - `PLAN_GRAPH_STORE` - Store backend (`memory`, `json_file`, `sqlite`)
//! - `PLAN_GRAPH_DATA_DIR` - Root directory of the JSON file store
//! - `PLAN_GRAPH_DB_PATH` - SQLite database path
//! - `PLAN_GRAPH_AGENT_ID` - Default agent id for new plans
//! - `PLAN_GRAPH_USER_DIR` / `PLAN_GRAPH_PROJECT_DIR` - Tier directories

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
