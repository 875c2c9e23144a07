//! The plan: registry and arena for one goal's task graph.
//!
//! A `Plan` owns every hydrated `Task` of its graph in a cache keyed by id,
//! plus three id lists:
//! - `all`: every registered id, creation order, never reordered
//! - `ready`: the priority queue of runnable ids, front first
//! - `done`: completed ids
//!
//! Task state changes go through the plan so the lists stay in step with
//! each task's `state`. The `impl Plan` blocks are split by concern:
//! - `mod.rs`: construction, registration, lookup, state bookkeeping
//! - `lifecycle.rs`: wiring, closing, retrying, prioritising
//! - `navigation.rs`: next-task selection, paths, siblings, views
//! - `persist.rs`: store records, saving, loading

mod lifecycle;
mod navigation;
mod persist;

pub use persist::PlanRecord;

use crate::config::PlanConfig;
use crate::db::{Store, now_ms};
use crate::error::{PlanError, PlanResult};
use crate::stack::TaskStack;
use crate::task::{DEFAULT_TASK_ID_PREFIX, Task};
use crate::types::TaskStatus;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default prefix of generated plan ids.
pub const DEFAULT_PLAN_ID_PREFIX: &str = "PL";

pub struct Plan {
    pub plan_id: String,
    pub agent_id: String,
    pub task_goal: String,
    pub long_description: String,
    pub created_at: i64,
    pub modified_at: i64,
    pub extra: Map<String, Value>,

    all: Vec<String>,
    ready: Vec<String>,
    done: Vec<String>,
    /// Top-level tasks, in registration order.
    subtasks: TaskStack,

    task_id_prefix: String,
    store: Arc<dyn Store>,
    loaded: HashMap<String, Task>,
    /// Registered since the last save, in registration order.
    new_ids: Vec<String>,
    /// Changed since the last save, excluding `new_ids`.
    modified_ids: BTreeSet<String>,
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("plan_id", &self.plan_id)
            .field("agent_id", &self.agent_id)
            .field("task_goal", &self.task_goal)
            .field("all", &self.all)
            .field("ready", &self.ready)
            .field("done", &self.done)
            .field("loaded", &self.loaded.len())
            .finish_non_exhaustive()
    }
}

impl Plan {
    pub fn new(
        plan_id: impl Into<String>,
        agent_id: impl Into<String>,
        task_goal: impl Into<String>,
        store: Arc<dyn Store>,
    ) -> Self {
        let now = now_ms();
        Self {
            plan_id: plan_id.into(),
            agent_id: agent_id.into(),
            task_goal: task_goal.into(),
            long_description: String::new(),
            created_at: now,
            modified_at: now,
            extra: Map::new(),
            all: Vec::new(),
            ready: Vec::new(),
            done: Vec::new(),
            subtasks: TaskStack::new(),
            task_id_prefix: DEFAULT_TASK_ID_PREFIX.to_string(),
            store,
            loaded: HashMap::new(),
            new_ids: Vec::new(),
            modified_ids: BTreeSet::new(),
        }
    }

    /// New plan with a generated id, using the configured agent and prefixes.
    pub fn from_config(config: &PlanConfig, task_goal: impl Into<String>, store: Arc<dyn Store>) -> Self {
        let plan_id = format!("{}{}", config.plan_id_prefix, uuid::Uuid::new_v4().simple());
        Self::new(plan_id, config.agent_id.clone(), task_goal, store)
            .with_task_id_prefix(config.task_id_prefix.clone())
    }

    pub fn with_description(mut self, long_description: impl Into<String>) -> Self {
        self.long_description = long_description.into();
        self
    }

    /// Prefix used for ids this plan generates (retry clones, `create_task`).
    pub fn with_task_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.task_id_prefix = prefix.into();
        self
    }

    pub fn task_id_prefix(&self) -> &str {
        &self.task_id_prefix
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Unregistered task with an id from this plan's prefix.
    pub fn create_task(&self, task_goal: impl Into<String>, long_description: impl Into<String>) -> Task {
        Task::with_id(
            crate::task::generate_task_id(&self.task_id_prefix),
            task_goal,
            long_description,
        )
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.all.iter().any(|id| id == task_id)
    }

    pub fn is_loaded(&self, task_id: &str) -> bool {
        self.loaded.contains_key(task_id)
    }

    /// Top-level task ids.
    pub fn subtasks(&self) -> &TaskStack {
        &self.subtasks
    }

    // ---- registration ----

    /// Register a top-level task. With `status == READY` the task is queued
    /// only if its predecessors are done; otherwise it stays `BACKLOG`.
    pub async fn add_task(&mut self, task: Task, status: TaskStatus) -> PlanResult<String> {
        self.validate_new(std::slice::from_ref(&task))?;
        let parent = self.plan_id.clone();
        let task_id = self.register(task, parent).await?;
        self.subtasks.add(task_id.clone());
        self.apply_initial_status(&task_id, status).await?;
        Ok(task_id)
    }

    /// Register several top-level tasks, keeping their order. All tasks are
    /// registered before any status is applied, so tasks in the batch may
    /// reference each other.
    pub async fn add_tasks(&mut self, tasks: Vec<Task>, status: TaskStatus) -> PlanResult<Vec<String>> {
        self.validate_new(&tasks)?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let parent = self.plan_id.clone();
            let task_id = self.register(task, parent).await?;
            self.subtasks.add(task_id.clone());
            ids.push(task_id);
        }
        for task_id in &ids {
            self.apply_initial_status(task_id, status).await?;
        }
        Ok(ids)
    }

    /// Register `task` as a subtask of `parent_id`. The parent moves to
    /// `IN_PROGRESS_WITH_SUBTASKS` and leaves the ready queue.
    pub async fn add_subtask(
        &mut self,
        parent_id: &str,
        task: Task,
        status: TaskStatus,
    ) -> PlanResult<String> {
        self.ensure_known(parent_id)?;
        self.ensure_loaded(parent_id).await?;
        if self.loaded_ref(parent_id)?.state().is_done() {
            return Err(PlanError::invalid_state(
                parent_id,
                format!("Cannot add a subtask to completed task {}", parent_id),
            ));
        }

        self.validate_new(std::slice::from_ref(&task))?;
        let task_id = self.register(task, parent_id.to_string()).await?;
        self.loaded_mut(parent_id)?.subtasks.add(task_id.clone());
        self.apply_state(parent_id, TaskStatus::InProgressWithSubtasks)?;
        self.apply_initial_status(&task_id, status).await?;
        Ok(task_id)
    }

    /// Checks that need no hydration, run before anything is registered:
    /// duplicate ids, self references, and related ids that are neither
    /// registered nor part of `tasks`.
    fn validate_new(&self, tasks: &[Task]) -> PlanResult<()> {
        let mut batch: HashSet<&str> = HashSet::with_capacity(tasks.len());
        for task in tasks {
            if self.contains(&task.task_id) || !batch.insert(task.task_id.as_str()) {
                return Err(PlanError::duplicate_task(&task.task_id));
            }
        }
        for task in tasks {
            if task.task_predecessors.contains(&task.task_id) || task.task_successors.contains(&task.task_id) {
                return Err(PlanError::self_reference(&task.task_id));
            }
            let related = task
                .task_predecessors
                .iter()
                .chain(task.task_successors.iter())
                .chain(task.subtasks.iter());
            for id in related {
                if !self.contains(id) && !batch.contains(id) {
                    return Err(PlanError::unknown_task(id));
                }
            }
        }
        Ok(())
    }

    /// Insert `task` into the arena under `parent_id` and complete the
    /// predecessor/successor symmetry with already registered tasks.
    async fn register(&mut self, mut task: Task, parent_id: String) -> PlanResult<String> {
        let task_id = task.task_id.clone();
        if self.contains(&task_id) {
            return Err(PlanError::duplicate_task(&task_id));
        }
        if task.task_predecessors.contains(&task_id) || task.task_successors.contains(&task_id) {
            return Err(PlanError::self_reference(&task_id));
        }

        let predecessors: Vec<String> = task
            .task_predecessors
            .iter()
            .filter(|id| self.contains(id))
            .map(str::to_string)
            .collect();
        let successors: Vec<String> = task
            .task_successors
            .iter()
            .filter(|id| self.contains(id))
            .map(str::to_string)
            .collect();

        for predecessor in &predecessors {
            if self.reaches(&successors, predecessor).await? {
                return Err(PlanError::dependency_cycle(predecessor, &task_id));
            }
        }

        task.state = TaskStatus::Backlog;
        task.task_parent_id = Some(parent_id);
        task.plan_id = Some(self.plan_id.clone());
        task.agent_id = Some(self.agent_id.clone());
        task.touch();

        self.all.push(task_id.clone());
        self.new_ids.push(task_id.clone());
        self.loaded.insert(task_id.clone(), task);

        for predecessor in &predecessors {
            self.ensure_loaded(predecessor).await?;
            if self.loaded_mut(predecessor)?.task_successors.add(task_id.clone()) {
                self.mark_modified(predecessor);
            }
        }
        for successor in &successors {
            self.ensure_loaded(successor).await?;
            let succ = self.loaded_mut(successor)?;
            let added = succ.task_predecessors.add(task_id.clone());
            let was_ready = succ.state == TaskStatus::Ready;
            if added {
                self.mark_modified(successor);
            }
            if was_ready {
                // New unfinished predecessor: back to the backlog.
                self.apply_state(successor, TaskStatus::Backlog)?;
            }
        }

        self.touch();
        debug!(plan_id = %self.plan_id, task_id = %task_id, "registered task");
        Ok(task_id)
    }

    async fn apply_initial_status(&mut self, task_id: &str, status: TaskStatus) -> PlanResult<()> {
        match status {
            TaskStatus::Backlog => {}
            TaskStatus::Ready => {
                self.promote_if_ready(task_id).await?;
            }
            TaskStatus::Done => {
                self.complete(task_id).await?;
                self.propagate_subtask_completion(task_id).await?;
            }
            TaskStatus::InProgress | TaskStatus::InProgressWithSubtasks => {
                self.apply_state(task_id, status)?;
            }
        }
        Ok(())
    }

    // ---- lookup ----

    /// Fetch a task, hydrating it from the store on a cache miss.
    pub async fn get_task(&mut self, task_id: &str) -> PlanResult<&Task> {
        self.ensure_loaded(task_id).await?;
        self.loaded_ref(task_id)
    }

    /// Mutable access for writing outputs and free-form fields. The task is
    /// marked for saving. State and relations are not reachable this way.
    pub async fn get_task_mut(&mut self, task_id: &str) -> PlanResult<&mut Task> {
        self.ensure_loaded(task_id).await?;
        self.mark_modified(task_id);
        let task = self.loaded_mut(task_id)?;
        task.touch();
        Ok(task)
    }

    /// Record an execution result on a task.
    pub async fn set_task_output(&mut self, task_id: &str, output: impl Into<String>) -> PlanResult<()> {
        self.get_task_mut(task_id).await?.task_text_output = Some(output.into());
        Ok(())
    }

    /// Resolve ids to tasks, in order, loading each at most once.
    pub async fn resolve(&mut self, ids: &[String]) -> PlanResult<Vec<&Task>> {
        for id in ids {
            self.ensure_loaded(id).await?;
        }
        let this: &Self = self;
        ids.iter().map(|id| this.loaded_ref(id)).collect()
    }

    pub(crate) async fn ensure_loaded(&mut self, task_id: &str) -> PlanResult<()> {
        if self.loaded.contains_key(task_id) {
            trace!(task_id, "task cache hit");
            return Ok(());
        }
        if !self.contains(task_id) {
            return Err(PlanError::task_not_found(task_id));
        }
        let task = self.fetch_task(task_id).await?;
        self.loaded.insert(task_id.to_string(), task);
        Ok(())
    }

    pub(crate) fn ensure_known(&self, task_id: &str) -> PlanResult<()> {
        if self.contains(task_id) {
            Ok(())
        } else {
            Err(PlanError::unknown_task(task_id))
        }
    }

    fn loaded_ref(&self, task_id: &str) -> PlanResult<&Task> {
        self.loaded
            .get(task_id)
            .ok_or_else(|| PlanError::task_not_found(task_id))
    }

    fn loaded_mut(&mut self, task_id: &str) -> PlanResult<&mut Task> {
        self.loaded
            .get_mut(task_id)
            .ok_or_else(|| PlanError::task_not_found(task_id))
    }

    fn mark_modified(&mut self, task_id: &str) {
        if !self.new_ids.iter().any(|id| id == task_id) {
            self.modified_ids.insert(task_id.to_string());
        }
    }

    fn touch(&mut self) {
        self.modified_at = now_ms();
    }

    // ---- readiness and state ----

    /// Readiness predicate: every predecessor and every subtask is `DONE`.
    /// Pure apart from hydrating tasks; the task's own state is not consulted.
    pub async fn would_be_ready(&mut self, task_id: &str) -> PlanResult<bool> {
        self.ensure_loaded(task_id).await?;
        let task = self.loaded_ref(task_id)?;
        let ids: Vec<String> = task
            .task_predecessors
            .iter()
            .chain(task.subtasks.iter())
            .map(str::to_string)
            .collect();
        let related = self.resolve(&ids).await?;
        Ok(related.iter().all(|t| t.state().is_done()))
    }

    /// Alias of `would_be_ready`.
    pub async fn is_ready(&mut self, task_id: &str) -> PlanResult<bool> {
        self.would_be_ready(task_id).await
    }

    /// Move the task to `READY` (back of the queue) if its state allows it
    /// and `would_be_ready` holds. Returns whether it is now ready.
    pub async fn promote_if_ready(&mut self, task_id: &str) -> PlanResult<bool> {
        self.ensure_loaded(task_id).await?;
        let state = self.loaded_ref(task_id)?.state();
        if !state.is_promotable() || !self.would_be_ready(task_id).await? {
            return Ok(false);
        }
        if state != TaskStatus::Ready || !self.ready.iter().any(|id| id == task_id) {
            self.apply_state(task_id, TaskStatus::Ready)?;
            debug!(task_id, "promoted to ready");
        }
        Ok(true)
    }

    /// Change a task's state and the plan's id lists together.
    ///
    /// Leaving `DONE` is rejected, as is `BACKLOG`/`READY`/`IN_PROGRESS` on a
    /// task that still has unfinished subtasks. `DONE` goes through
    /// `close_task`, so successors and the parent are updated as well.
    pub async fn set_task_state(&mut self, task_id: &str, state: TaskStatus) -> PlanResult<()> {
        self.ensure_known(task_id)?;
        self.ensure_loaded(task_id).await?;
        if state.is_done() {
            self.close_task(task_id).await?;
            return Ok(());
        }
        if matches!(
            state,
            TaskStatus::Backlog | TaskStatus::Ready | TaskStatus::InProgress
        ) && self.has_active_subtasks(task_id).await?
        {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Task {} has unfinished subtasks and cannot be {}", task_id, state),
            ));
        }
        self.apply_state(task_id, state)
    }

    pub(crate) async fn has_active_subtasks(&mut self, task_id: &str) -> PlanResult<bool> {
        self.ensure_loaded(task_id).await?;
        let subtasks = self.loaded_ref(task_id)?.subtasks.get_all_task_ids();
        let resolved = self.resolve(&subtasks).await?;
        Ok(resolved.iter().any(|t| !t.state().is_done()))
    }

    /// Bookkeeping core; the task must be loaded.
    fn apply_state(&mut self, task_id: &str, state: TaskStatus) -> PlanResult<()> {
        let task = self.loaded_mut(task_id)?;
        if task.state.is_done() && !state.is_done() {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Task {} is DONE and cannot move to {}", task_id, state),
            ));
        }
        task.state = state;
        task.touch();
        self.mark_modified(task_id);

        match state {
            TaskStatus::Ready => {
                if !self.ready.iter().any(|id| id == task_id) {
                    self.ready.push(task_id.to_string());
                }
            }
            TaskStatus::Done => {
                self.ready.retain(|id| id != task_id);
                if !self.done.iter().any(|id| id == task_id) {
                    self.done.push(task_id.to_string());
                }
            }
            _ => self.ready.retain(|id| id != task_id),
        }
        self.touch();
        Ok(())
    }

    /// Whether `target` is reachable from any of `start` along successor edges.
    async fn reaches(&mut self, start: &[String], target: &str) -> PlanResult<bool> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = start.iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            if current == target {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            self.ensure_loaded(&current).await?;
            for next in self.loaded_ref(&current)?.task_successors.iter() {
                if !visited.contains(next) {
                    queue.push_back(next.to_string());
                }
            }
        }
        Ok(false)
    }
}
