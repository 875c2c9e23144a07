//! Persistence layer for plans and tasks.
//!
//! The plan/task core only talks to the `Store` trait: add/get/update/delete
//! plus `list` with a data-only `Filter`. Backends:
//! - `MemoryStore`: in-process maps, for tests and ephemeral agents
//! - `JsonFileStore`: one JSON file per record
//! - `SqliteStore`: single-table document store in SQLite

pub mod filter;
pub mod jsonfile;
pub mod memory;
pub mod sqlite;

pub use filter::{Filter, FilterItem, Operator};
pub use jsonfile::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Table holding plan records.
pub const PLANS_TABLE: &str = "plans";

/// Table holding task records.
pub const TASKS_TABLE: &str = "tasks";

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Record key. Plans and tasks use `(id, agent_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub primary_key: String,
    pub secondary_key: Option<String>,
}

impl StoreKey {
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            secondary_key: None,
        }
    }

    pub fn scoped(primary_key: impl Into<String>, secondary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            secondary_key: Some(secondary_key.into()),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary_key {
            Some(secondary) => write!(f, "{}/{}", secondary, self.primary_key),
            None => write!(f, "{}", self.primary_key),
        }
    }
}

/// Minimal CRUD + filter contract consumed by the plan/task core.
///
/// Saves are last-write-wins; no multi-record transaction is assumed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a record, replacing any existing one under the same key.
    /// Returns the primary key.
    async fn add(&self, key: &StoreKey, value: Value, table: &str) -> Result<String, StoreError>;

    /// Fetch a record, `None` if absent.
    async fn get(&self, key: &StoreKey, table: &str) -> Result<Option<Value>, StoreError>;

    /// Replace an existing record. Fails with `NotFound` if the key is absent.
    async fn update(&self, key: &StoreKey, value: Value, table: &str) -> Result<(), StoreError>;

    /// Remove a record. Fails with `NotFound` if the key is absent.
    async fn delete(&self, key: &StoreKey, table: &str) -> Result<(), StoreError>;

    /// All records of `table` matching `filter`.
    async fn list(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// Update if present, add otherwise.
    async fn upsert(&self, key: &StoreKey, value: Value, table: &str) -> Result<(), StoreError> {
        if self.get(key, table).await?.is_some() {
            self.update(key, value, table).await
        } else {
            self.add(key, value, table).await.map(|_| ())
        }
    }
}

/// Build the configured backend. Callers pass the result into `Plan`
/// explicitly; there is no process-wide adapter cache.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
    let store: Arc<dyn Store> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::JsonFile => Arc::new(JsonFileStore::new(&config.json_file_path)),
        StoreBackend::Sqlite => {
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStore::open(&config.db_path)?)
        }
    };
    Ok(store)
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_key_display() {
        assert_eq!(StoreKey::new("P1").to_string(), "P1");
        assert_eq!(StoreKey::scoped("T1", "A1").to_string(), "A1/T1");
    }

    #[tokio::test]
    async fn upsert_adds_then_updates() {
        let store = MemoryStore::new();
        let key = StoreKey::scoped("T1", "A1");

        store.upsert(&key, json!({"v": 1}), TASKS_TABLE).await.unwrap();
        store.upsert(&key, json!({"v": 2}), TASKS_TABLE).await.unwrap();

        let value = store.get(&key, TASKS_TABLE).await.unwrap().unwrap();
        assert_eq!(value["v"], 2);
    }

    #[tokio::test]
    async fn open_store_builds_memory_backend() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        let store = open_store(&config).unwrap();
        let key = StoreKey::new("x");
        store.add(&key, json!({"a": 1}), "t").await.unwrap();
        assert!(store.get(&key, "t").await.unwrap().is_some());
    }
}
