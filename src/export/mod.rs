//! Plan snapshots: one JSON document holding a plan record and all of its
//! tasks, optionally gzip-compressed. A snapshot can be re-imported into
//! any store backend.

use crate::db::{PLANS_TABLE, Store, StoreKey, TASKS_TABLE};
use crate::error::{PlanError, PlanResult};
use crate::plan::{Plan, PlanRecord};
use crate::task::Task;
use anyhow::Context;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::info;

/// Snapshot format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub export_version: String,
    /// RFC 3339 timestamp of export.
    pub exported_at: String,
    pub exported_by: String,
    pub plan: PlanRecord,
    /// Every task of the plan, in creation order.
    pub tasks: Vec<Task>,
}

impl Snapshot {
    /// Capture a plan, hydrating every task.
    pub async fn from_plan(plan: &mut Plan) -> PlanResult<Self> {
        let ids = plan.get_all_tasks_ids().to_vec();
        let tasks = plan.resolve(&ids).await?.into_iter().cloned().collect();
        Ok(Self {
            export_version: EXPORT_VERSION.to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            exported_by: format!("plan-graph v{}", env!("CARGO_PKG_VERSION")),
            plan: plan.to_record(),
            tasks,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a snapshot from a file, plain JSON or gzip.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let mut bytes = Vec::new();
        File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .read_to_end(&mut bytes)?;

        if bytes.starts_with(&[0x1f, 0x8b]) {
            let decoder = GzDecoder::new(BufReader::new(bytes.as_slice()));
            Ok(serde_json::from_reader(decoder)?)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }

    /// Write to `path`, gzip-compressed when `gzip` is set.
    pub fn write_to_file(&self, path: &Path, gzip: bool) -> anyhow::Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_to(file, gzip)?;
        Ok(())
    }

    /// Write to any writer and flush it. Returns the writer.
    pub fn write_to<W: Write>(&self, writer: W, gzip: bool) -> anyhow::Result<W> {
        let json = self.to_json_pretty()?;
        let mut writer = if gzip {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?
        } else {
            let mut writer = writer;
            writer.write_all(json.as_bytes())?;
            writer
        };
        writer.flush()?;
        Ok(writer)
    }

    /// Check that every id the plan lists has a task in the snapshot and
    /// that no task appears twice.
    pub fn validate(&self) -> PlanResult<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.task_id.as_str()) {
                return Err(PlanError::duplicate_task(&task.task_id));
            }
        }
        for id in &self.plan.all_task_ids {
            if !seen.contains(id.as_str()) {
                return Err(PlanError::task_not_found(id)
                    .with_details("Listed by the plan but absent from the snapshot"));
            }
        }
        Ok(())
    }

    /// Move the plan and its tasks to another agent before import.
    pub fn reassign_agent(&mut self, agent_id: &str) {
        self.plan.agent_id = agent_id.to_string();
        for task in &mut self.tasks {
            task.agent_id = Some(agent_id.to_string());
        }
    }

    /// Write the plan and its tasks into `store`, replacing records with
    /// the same keys. Returns the plan id.
    pub async fn import_into(&self, store: &dyn Store) -> PlanResult<String> {
        self.validate()?;
        let agent_id = &self.plan.agent_id;
        for task in &self.tasks {
            let key = StoreKey::scoped(task.task_id.clone(), agent_id.clone());
            store.upsert(&key, serde_json::to_value(task)?, TASKS_TABLE).await?;
        }
        let key = StoreKey::scoped(self.plan.plan_id.clone(), agent_id.clone());
        store
            .upsert(&key, serde_json::to_value(&self.plan)?, PLANS_TABLE)
            .await?;
        info!(
            plan_id = %self.plan.plan_id,
            tasks = self.tasks.len(),
            "snapshot imported"
        );
        Ok(self.plan.plan_id.clone())
    }
}
