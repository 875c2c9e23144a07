//! SQLite-backed document store.

use super::{Filter, Store, StoreError, StoreKey, now_ms};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Store handle wrapping a SQLite connection.
///
/// Every record lives in one `documents` table keyed by
/// `(table_name, primary_key, secondary_key)` with a JSON body.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            embedded::migrations::runner()
                .run(conn)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            Ok(())
        })
    }

    /// Execute a function with exclusive access to the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        f(&conn)
    }

    fn with_conn_mut<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        f(&mut conn)
    }
}

fn secondary(key: &StoreKey) -> &str {
    key.secondary_key.as_deref().unwrap_or("")
}

#[async_trait]
impl Store for SqliteStore {
    async fn add(&self, key: &StoreKey, value: Value, table: &str) -> Result<String, StoreError> {
        let body = serde_json::to_string(&value)?;
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (table_name, primary_key, secondary_key, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(table_name, primary_key, secondary_key)
                 DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![table, key.primary_key, secondary(key), body, now],
            )?;
            Ok(key.primary_key.clone())
        })
    }

    async fn get(&self, key: &StoreKey, table: &str) -> Result<Option<Value>, StoreError> {
        let body: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT body FROM documents
                     WHERE table_name = ?1 AND primary_key = ?2 AND secondary_key = ?3",
                    params![table, key.primary_key, secondary(key)],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    async fn update(&self, key: &StoreKey, value: Value, table: &str) -> Result<(), StoreError> {
        let body = serde_json::to_string(&value)?;
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE documents SET body = ?4, updated_at = ?5
                 WHERE table_name = ?1 AND primary_key = ?2 AND secondary_key = ?3",
                params![table, key.primary_key, secondary(key), body, now_ms()],
            )?)
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("{}/{}", table, key)));
        }
        Ok(())
    }

    async fn delete(&self, key: &StoreKey, table: &str) -> Result<(), StoreError> {
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM documents
                 WHERE table_name = ?1 AND primary_key = ?2 AND secondary_key = ?3",
                params![table, key.primary_key, secondary(key)],
            )?)
        })?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("{}/{}", table, key)));
        }
        Ok(())
    }

    async fn list(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let bodies: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM documents WHERE table_name = ?1
                 ORDER BY created_at, primary_key",
            )?;
            let rows = stmt
                .query_map(params![table], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })?;

        let mut records = Vec::with_capacity(bodies.len());
        for body in bodies {
            let value: Value = serde_json::from_str(&body)?;
            if filter.matches(&value) {
                records.push(value);
            }
        }
        Ok(records)
    }
}
