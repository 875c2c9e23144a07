//! Plan and task records in the store.

use super::Plan;
use crate::db::{Filter, PLANS_TABLE, Store, StoreError, StoreKey, TASKS_TABLE};
use crate::error::{PlanError, PlanResult};
use crate::stack::TaskStack;
use crate::task::{DEFAULT_TASK_ID_PREFIX, Task};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stored shape of a plan. Tasks are stored separately, keyed by
/// `(task_id, agent_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub plan_id: String,
    pub agent_id: String,
    pub task_goal: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(rename = "_all_task_ids", default)]
    pub all_task_ids: Vec<String>,
    #[serde(rename = "_ready_task_ids", default)]
    pub ready_task_ids: Vec<String>,
    #[serde(rename = "_done_task_ids", default)]
    pub done_task_ids: Vec<String>,
    #[serde(rename = "subtasks_id", default)]
    pub subtasks: TaskStack,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub modified_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plan {
    fn plan_key(&self) -> StoreKey {
        StoreKey::scoped(self.plan_id.clone(), self.agent_id.clone())
    }

    fn task_key(&self, task_id: &str) -> StoreKey {
        StoreKey::scoped(task_id, self.agent_id.clone())
    }

    pub fn to_record(&self) -> PlanRecord {
        PlanRecord {
            plan_id: self.plan_id.clone(),
            agent_id: self.agent_id.clone(),
            task_goal: self.task_goal.clone(),
            long_description: self.long_description.clone(),
            all_task_ids: self.all.clone(),
            ready_task_ids: self.ready.clone(),
            done_task_ids: self.done.clone(),
            subtasks: self.subtasks.clone(),
            created_at: self.created_at,
            modified_at: self.modified_at,
            extra: self.extra.clone(),
        }
    }

    /// Rebuild a plan shell from its record. No task is hydrated.
    pub fn from_record(record: PlanRecord, store: Arc<dyn Store>) -> Self {
        Self {
            plan_id: record.plan_id,
            agent_id: record.agent_id,
            task_goal: record.task_goal,
            long_description: record.long_description,
            created_at: record.created_at,
            modified_at: record.modified_at,
            extra: record.extra,
            all: record.all_task_ids,
            ready: record.ready_task_ids,
            done: record.done_task_ids,
            subtasks: record.subtasks,
            task_id_prefix: DEFAULT_TASK_ID_PREFIX.to_string(),
            store,
            loaded: HashMap::new(),
            new_ids: Vec::new(),
            modified_ids: BTreeSet::new(),
        }
    }

    /// Write the plan record and every registered task for the first time.
    pub async fn db_create(&mut self) -> PlanResult<()> {
        let record = serde_json::to_value(self.to_record())?;
        self.store.add(&self.plan_key(), record, PLANS_TABLE).await?;
        info!(plan_id = %self.plan_id, agent_id = %self.agent_id, "plan created");
        self.db_save().await
    }

    /// Persist changes since the last save: new tasks are added, modified
    /// tasks updated, and the plan record upserted.
    pub async fn db_save(&mut self) -> PlanResult<()> {
        let new_ids = self.new_ids.clone();
        let modified_ids = self.modified_ids.clone();

        for task_id in &new_ids {
            self.save_task(task_id, true).await?;
        }
        for task_id in &modified_ids {
            self.save_task(task_id, false).await?;
        }

        let record = serde_json::to_value(self.to_record())?;
        self.store.upsert(&self.plan_key(), record, PLANS_TABLE).await?;
        self.new_ids.clear();
        self.modified_ids.clear();
        debug!(
            plan_id = %self.plan_id,
            added = new_ids.len(),
            updated = modified_ids.len(),
            "plan saved"
        );
        Ok(())
    }

    async fn save_task(&self, task_id: &str, is_new: bool) -> PlanResult<()> {
        let Some(task) = self.loaded.get(task_id) else {
            warn!(task_id, "dirty task no longer cached, skipped");
            return Ok(());
        };
        let key = self.task_key(task_id);
        let value = serde_json::to_value(task)?;
        if is_new {
            self.store.add(&key, value, TASKS_TABLE).await?;
        } else {
            self.store.update(&key, value, TASKS_TABLE).await?;
        }
        Ok(())
    }

    /// Drop a task from the in-memory cache. Pending changes to it are
    /// written first. Returns whether it was cached.
    pub async fn unregister_loaded_task(&mut self, task_id: &str) -> PlanResult<bool> {
        if !self.loaded.contains_key(task_id) {
            return Ok(false);
        }
        if let Some(pos) = self.new_ids.iter().position(|id| id == task_id) {
            self.save_task(task_id, true).await?;
            self.new_ids.remove(pos);
        } else if self.modified_ids.contains(task_id) {
            self.save_task(task_id, false).await?;
            self.modified_ids.remove(task_id);
        }
        self.loaded.remove(task_id);
        debug!(task_id, "task evicted from cache");
        Ok(true)
    }

    /// Load a task record. Called on cache misses only.
    pub(super) async fn fetch_task(&self, task_id: &str) -> PlanResult<Task> {
        debug!(task_id, "loading task from store");
        match self.store.get(&self.task_key(task_id), TASKS_TABLE).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(PlanError::task_not_found(task_id)
                .with_details("Registered in the plan but missing from the store")),
        }
    }

    /// Load a plan shell by id. Tasks hydrate lazily through `get_task`.
    pub async fn load(plan_id: &str, agent_id: &str, store: Arc<dyn Store>) -> PlanResult<Plan> {
        let key = StoreKey::scoped(plan_id, agent_id);
        let value = store
            .get(&key, PLANS_TABLE)
            .await?
            .ok_or_else(|| PlanError::plan_not_found(plan_id))?;
        let record: PlanRecord = serde_json::from_value(value)?;
        debug!(plan_id, tasks = record.all_task_ids.len(), "plan loaded");
        Ok(Plan::from_record(record, store))
    }

    /// Ids of the plans stored for `agent_id`.
    pub async fn list_plan_ids(store: &dyn Store, agent_id: &str) -> PlanResult<Vec<String>> {
        let filter = Filter::new().eq("agent_id", agent_id);
        let records = store.list(PLANS_TABLE, &filter).await?;
        Ok(records
            .iter()
            .filter_map(|r| r.get("plan_id").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    /// Remove the plan record and every task record from the store.
    pub async fn db_delete(self) -> PlanResult<()> {
        for task_id in &self.all {
            match self.store.delete(&self.task_key(task_id), TASKS_TABLE).await {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.store.delete(&self.plan_key(), PLANS_TABLE).await?;
        info!(plan_id = %self.plan_id, "plan deleted");
        Ok(())
    }
}
