//! Ordered id lists for task relations.

use crate::error::PlanResult;
use crate::plan::Plan;
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free list of task ids for one relation
/// (predecessors, successors or subtasks).
///
/// The stack holds ids only; resolving them into tasks goes through the
/// owning `Plan`, which hydrates from storage on a cache miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStack(Vec<String>);

impl TaskStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task_id` unless already present.
    pub fn add(&mut self, task_id: impl Into<String>) -> bool {
        let task_id = task_id.into();
        if self.contains(&task_id) {
            return false;
        }
        self.0.push(task_id);
        true
    }

    pub fn remove(&mut self, task_id: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|id| id != task_id);
        self.0.len() != before
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.0.iter().any(|id| id == task_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Ids in insertion order.
    pub fn get_all_task_ids(&self) -> Vec<String> {
        self.0.clone()
    }

    /// Resolve every id through `plan`, in order. An unknown id is a
    /// `TASK_NOT_FOUND` error.
    pub async fn get_all_tasks_from_stack<'p>(&self, plan: &'p mut Plan) -> PlanResult<Vec<&'p Task>> {
        plan.resolve(&self.0).await
    }

    /// Resolved tasks that are not `DONE`.
    pub async fn get_active_tasks_from_stack<'p>(
        &self,
        plan: &'p mut Plan,
    ) -> PlanResult<Vec<&'p Task>> {
        let tasks = plan.resolve(&self.0).await?;
        Ok(tasks.into_iter().filter(|t| !t.state().is_done()).collect())
    }

    /// Resolved tasks that are `DONE`.
    pub async fn get_done_tasks_from_stack<'p>(
        &self,
        plan: &'p mut Plan,
    ) -> PlanResult<Vec<&'p Task>> {
        let tasks = plan.resolve(&self.0).await?;
        Ok(tasks.into_iter().filter(|t| t.state().is_done()).collect())
    }
}

impl From<Vec<String>> for TaskStack {
    fn from(ids: Vec<String>) -> Self {
        let mut stack = TaskStack::new();
        for id in ids {
            stack.add(id);
        }
        stack
    }
}

impl<'a> IntoIterator for &'a TaskStack {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_ordered() {
        let mut stack = TaskStack::new();
        assert!(stack.add("b"));
        assert!(stack.add("a"));
        assert!(!stack.add("b"));
        assert_eq!(stack.get_all_task_ids(), vec!["b", "a"]);
        assert_eq!(stack.get_all_task_ids(), stack.get_all_task_ids());
    }

    #[test]
    fn from_vec_dedups() {
        let stack = TaskStack::from(vec!["1".to_string(), "2".to_string(), "1".to_string()]);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut stack = TaskStack::new();
        stack.add("101");
        assert_eq!(serde_json::to_string(&stack).unwrap(), r#"["101"]"#);
    }

    #[test]
    fn remove() {
        let mut stack = TaskStack::from(vec!["x".to_string()]);
        assert!(stack.remove("x"));
        assert!(!stack.remove("x"));
        assert!(stack.is_empty());
    }
}
