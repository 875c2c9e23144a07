//! JSON file store: one file per record.
//!
//! Layout: `<root>/<table>/<secondary_key>/<primary_key>.json`, the
//! secondary directory being omitted for unscoped keys.

use super::{Filter, Store, StoreError, StoreKey};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, trace};

pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, key: &StoreKey, table: &str) -> PathBuf {
        let mut path = self.root.join(file_component(table));
        if let Some(secondary) = &key.secondary_key {
            path = path.join(file_component(secondary));
        }
        path.join(format!("{}.json", file_component(&key.primary_key)))
    }

    async fn read(&self, path: &Path) -> Result<Option<Value>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &Path, value: &Value) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(path, bytes).await?;
        debug!(path = %path.display(), "saved record");
        Ok(())
    }
}

/// Keep keys from escaping their table directory.
fn file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[async_trait]
impl Store for JsonFileStore {
    async fn add(&self, key: &StoreKey, value: Value, table: &str) -> Result<String, StoreError> {
        let path = self.file_path(key, table);
        self.write(&path, &value).await?;
        Ok(key.primary_key.clone())
    }

    async fn get(&self, key: &StoreKey, table: &str) -> Result<Option<Value>, StoreError> {
        let path = self.file_path(key, table);
        trace!(path = %path.display(), "loading record");
        self.read(&path).await
    }

    async fn update(&self, key: &StoreKey, value: Value, table: &str) -> Result<(), StoreError> {
        let path = self.file_path(key, table);
        if !fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(format!("{}/{}", table, key)));
        }
        self.write(&path, &value).await
    }

    async fn delete(&self, key: &StoreKey, table: &str) -> Result<(), StoreError> {
        let path = self.file_path(key, table);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("{}/{}", table, key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, table: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let table_dir = self.root.join(file_component(table));
        if !fs::try_exists(&table_dir).await? {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut pending = vec![table_dir];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
        }
        files.sort();

        let mut records = Vec::new();
        for path in files {
            if let Some(value) = self.read(&path).await?
                && filter.matches(&value)
            {
                records.push(value);
            }
        }
        Ok(records)
    }
}
