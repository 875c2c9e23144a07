//! A single node of a plan graph.

use crate::db::now_ms;
use crate::error::{PlanError, PlanResult};
use crate::stack::TaskStack;
use crate::types::TaskStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};

/// Default prefix of generated task ids.
pub const DEFAULT_TASK_ID_PREFIX: &str = "T";

/// Generate a task id: `prefix` followed by a random uuid.
pub fn generate_task_id(prefix: &str) -> String {
    format!("{}{}", prefix, uuid::Uuid::new_v4().simple())
}

/// A unit of work.
///
/// Relations are id lists; the owning `Plan` resolves them. `state` and the
/// relation stacks are read-only outside the crate so that the plan's
/// ready/done bookkeeping and predecessor/successor symmetry cannot drift.
///
/// Two tasks are equal (and hash equal) iff their ids are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub task_goal: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub(crate) state: TaskStatus,

    /// Owning container: the plan id for top-level tasks, else the parent task id.
    #[serde(default)]
    pub(crate) task_parent_id: Option<String>,
    #[serde(default)]
    pub(crate) plan_id: Option<String>,
    #[serde(default)]
    pub(crate) agent_id: Option<String>,

    #[serde(rename = "task_predecessors_id", default)]
    pub(crate) task_predecessors: TaskStack,
    #[serde(rename = "task_successors_id", default)]
    pub(crate) task_successors: TaskStack,
    #[serde(rename = "subtasks_id", default)]
    pub(crate) subtasks: TaskStack,

    #[serde(default)]
    pub task_text_output: Option<String>,
    #[serde(default)]
    pub task_text_output_as_uml: Option<String>,

    /// Id of the task this one was cloned from by a retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retried_from: Option<String>,
    /// 1 for an original task, incremented on each retry.
    #[serde(default = "first_attempt")]
    pub attempt: u32,

    pub created_at: i64,
    pub modified_at: i64,

    /// Unknown keys from stored records, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn first_attempt() -> u32 {
    1
}

impl Task {
    /// New `BACKLOG` task with a generated id.
    pub fn new(task_goal: impl Into<String>, long_description: impl Into<String>) -> Self {
        Self::with_id(generate_task_id(DEFAULT_TASK_ID_PREFIX), task_goal, long_description)
    }

    /// New `BACKLOG` task with an explicit id.
    pub fn with_id(
        task_id: impl Into<String>,
        task_goal: impl Into<String>,
        long_description: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            task_id: task_id.into(),
            task_goal: task_goal.into(),
            long_description: long_description.into(),
            state: TaskStatus::Backlog,
            task_parent_id: None,
            plan_id: None,
            agent_id: None,
            task_predecessors: TaskStack::new(),
            task_successors: TaskStack::new(),
            subtasks: TaskStack::new(),
            task_text_output: None,
            task_text_output_as_uml: None,
            retried_from: None,
            attempt: first_attempt(),
            created_at: now,
            modified_at: now,
            extra: Map::new(),
        }
    }

    pub fn state(&self) -> TaskStatus {
        self.state
    }

    pub fn task_parent_id(&self) -> Option<&str> {
        self.task_parent_id.as_deref()
    }

    pub fn plan_id(&self) -> Option<&str> {
        self.plan_id.as_deref()
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    /// Parent task id, `None` for top-level tasks and unregistered ones.
    pub fn parent_task_id(&self) -> Option<&str> {
        match (&self.task_parent_id, &self.plan_id) {
            (Some(parent), Some(plan)) if parent == plan => None,
            (parent, _) => parent.as_deref(),
        }
    }

    pub fn predecessors(&self) -> &TaskStack {
        &self.task_predecessors
    }

    pub fn successors(&self) -> &TaskStack {
        &self.task_successors
    }

    pub fn subtasks(&self) -> &TaskStack {
        &self.subtasks
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Wire `predecessor -> self` on both values. For tasks not yet
    /// registered; registered tasks are wired through `Plan::add_predecessor`.
    pub fn add_predecessor(&mut self, predecessor: &mut Task) -> PlanResult<()> {
        if predecessor.task_id == self.task_id {
            return Err(PlanError::self_reference(&self.task_id));
        }
        self.task_predecessors.add(predecessor.task_id.clone());
        predecessor.task_successors.add(self.task_id.clone());
        self.touch();
        predecessor.touch();
        Ok(())
    }

    /// Wire `self -> successor` on both values.
    pub fn add_successor(&mut self, successor: &mut Task) -> PlanResult<()> {
        successor.add_predecessor(self)
    }

    /// Copy of this task under a fresh id, reset for another attempt:
    /// same goal, description and predecessor/successor ids; no subtasks,
    /// no output, state `BACKLOG`, `attempt + 1`.
    pub fn clone_with_new_id(&self, prefix: &str) -> Task {
        let now = now_ms();
        Task {
            task_id: generate_task_id(prefix),
            state: TaskStatus::Backlog,
            subtasks: TaskStack::new(),
            task_text_output: None,
            task_text_output_as_uml: None,
            retried_from: Some(self.task_id.clone()),
            attempt: self.attempt + 1,
            created_at: now,
            modified_at: now,
            ..self.clone()
        }
    }

    /// One-line summary for traces.
    pub fn debug_formatted_str(&self, status: bool) -> String {
        let mut line = format!("Task {} : {}", self.task_id, self.task_goal);
        if status {
            line.push_str(&format!(" [{}]", self.state));
        }
        if !self.subtasks.is_empty() {
            line.push_str(&format!(" ({} subtasks)", self.subtasks.len()));
        }
        line
    }

    pub(crate) fn touch(&mut self) {
        self.modified_at = now_ms();
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.task_id == other.task_id
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.task_id.hash(state);
    }
}
