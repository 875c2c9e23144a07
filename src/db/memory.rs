//! In-memory store implementation.

use super::{Filter, Store, StoreError, StoreKey};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Table = BTreeMap<StoreKey, Value>;

/// In-memory implementation for development and testing.
///
/// Records are kept per table and listed in key order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(table).map_or(0, |t| t.len()))
            .unwrap_or(0)
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Internal(err.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn add(&self, key: &StoreKey, value: Value, table: &str) -> Result<String, StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.clone(), value);
        Ok(key.primary_key.clone())
    }

    async fn get(&self, key: &StoreKey, table: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn update(&self, key: &StoreKey, value: Value, table: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        match tables.get_mut(table).and_then(|t| t.get_mut(key)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{}/{}", table, key))),
        }
    }

    async fn delete(&self, key: &StoreKey, table: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        match tables.get_mut(table).and_then(|t| t.remove(key)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("{}/{}", table, key))),
        }
    }

    async fn list(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(table)
            .map(|t| t.values().filter(|v| filter.matches(v)).cloned().collect())
            .unwrap_or_default())
    }
}
