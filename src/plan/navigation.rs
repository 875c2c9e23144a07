//! Next-task selection and read-only views over the graph.

use super::Plan;
use crate::error::{PlanError, PlanResult};
use crate::format;
use crate::task::Task;
use crate::types::TaskStatus;
use tracing::{debug, warn};

impl Plan {
    /// Pick the task to work on after `current`.
    ///
    /// - `None`: the front of the ready queue, if any.
    /// - a `READY` task: that same task (it has not been started).
    /// - a `DONE` task: the front of the ready queue; failing that, the first
    ///   `BACKLOG` or `IN_PROGRESS_WITH_SUBTASKS` task in creation order whose
    ///   readiness holds, promoted to `READY`; failing that, `None`.
    /// - any other state is a caller error.
    ///
    /// Never closes or starts anything.
    pub async fn get_next_task(&mut self, current: Option<&str>) -> PlanResult<Option<&Task>> {
        let next_id = match current {
            None => self.ready.first().cloned(),
            Some(current_id) => {
                self.ensure_loaded(current_id).await?;
                let state = self.loaded_ref(current_id)?.state();
                match state {
                    TaskStatus::Ready => Some(current_id.to_string()),
                    TaskStatus::Done => self.next_after_done().await?,
                    other => {
                        return Err(PlanError::invalid_state(
                            current_id,
                            format!(
                                "get_next_task called with task {} in state {}",
                                current_id, other
                            ),
                        ));
                    }
                }
            }
        };

        match next_id {
            Some(id) => {
                debug!(plan_id = %self.plan_id, task_id = %id, "next task");
                self.get_task(&id).await.map(Some)
            }
            None => Ok(None),
        }
    }

    async fn next_after_done(&mut self) -> PlanResult<Option<String>> {
        if let Some(front) = self.ready.first() {
            return Ok(Some(front.clone()));
        }

        let all = self.all.clone();
        for task_id in &all {
            if self.done.contains(task_id) {
                continue;
            }
            self.ensure_loaded(task_id).await?;
            let state = self.loaded_ref(task_id)?.state();
            if matches!(state, TaskStatus::Backlog | TaskStatus::InProgressWithSubtasks)
                && self.promote_if_ready(task_id).await?
            {
                return Ok(Some(task_id.clone()));
            }
        }

        if !self.is_complete() {
            warn!(
                plan_id = %self.plan_id,
                open = self.all.len() - self.done.len(),
                "no actionable task while plan is incomplete"
            );
        }
        Ok(None)
    }

    /// Ancestor chain of a task, root first, excluding the plan. With
    /// `include_self` the task itself ends the list.
    pub async fn get_task_path(&mut self, task_id: &str, include_self: bool) -> PlanResult<Vec<&Task>> {
        let ids = self.path_ids(task_id, include_self).await?;
        self.resolve(&ids).await
    }

    async fn path_ids(&mut self, task_id: &str, include_self: bool) -> PlanResult<Vec<String>> {
        self.ensure_loaded(task_id).await?;
        let mut ids = Vec::new();
        if include_self {
            ids.push(task_id.to_string());
        }
        let mut cursor = self.loaded_ref(task_id)?.parent_task_id().map(str::to_string);
        while let Some(parent_id) = cursor {
            if ids.contains(&parent_id) {
                break;
            }
            self.ensure_loaded(&parent_id).await?;
            cursor = self.loaded_ref(&parent_id)?.parent_task_id().map(str::to_string);
            ids.push(parent_id);
        }
        ids.reverse();
        Ok(ids)
    }

    /// Path from the plan goal down to the task, one line per level.
    pub async fn get_formatted_task_path(&mut self, task_id: &str) -> PlanResult<String> {
        let goal = self.task_goal.clone();
        let path = self.get_task_path(task_id, true).await?;
        Ok(format::format_task_path(&goal, &path))
    }

    /// Ids of the other tasks under the same parent, in registration order.
    pub async fn get_siblings_ids(&mut self, task_id: &str) -> PlanResult<Vec<String>> {
        self.ensure_loaded(task_id).await?;
        let parent = self.loaded_ref(task_id)?.parent_task_id().map(str::to_string);
        let family = match parent {
            Some(parent_id) => {
                self.ensure_loaded(&parent_id).await?;
                self.loaded_ref(&parent_id)?.subtasks.get_all_task_ids()
            }
            None => self.subtasks.get_all_task_ids(),
        };
        Ok(family.into_iter().filter(|id| id != task_id).collect())
    }

    pub async fn get_siblings(&mut self, task_id: &str) -> PlanResult<Vec<&Task>> {
        let ids = self.get_siblings_ids(task_id).await?;
        self.resolve(&ids).await
    }

    /// Ready queue ids, front first.
    pub fn get_ready_tasks_ids(&self) -> &[String] {
        &self.ready
    }

    pub async fn get_ready_tasks(&mut self) -> PlanResult<Vec<&Task>> {
        let ids = self.ready.clone();
        self.resolve(&ids).await
    }

    /// Every registered id, creation order.
    pub fn get_all_tasks_ids(&self) -> &[String] {
        &self.all
    }

    pub fn get_all_done_tasks_ids(&self) -> &[String] {
        &self.done
    }

    /// Every registered task is done.
    pub fn is_complete(&self) -> bool {
        self.all.iter().all(|id| self.done.contains(id))
    }

    /// The `count` most recently closed tasks, most recent first.
    pub async fn get_last_achieved_tasks(&mut self, count: usize) -> PlanResult<Vec<&Task>> {
        let ids: Vec<String> = self.done.iter().rev().take(count).cloned().collect();
        self.resolve(&ids).await
    }

    /// ASCII tree of the plan down to `depth` levels (0 = unlimited),
    /// hydrating every task.
    pub async fn debug_dump_str(&mut self, depth: usize) -> PlanResult<String> {
        let all = self.all.clone();
        self.resolve(&all).await?;
        Ok(format::format_plan_tree(
            &self.plan_id,
            &self.task_goal,
            &self.subtasks,
            &self.loaded,
            depth,
        ))
    }
}
