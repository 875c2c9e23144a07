//! Wiring, closing, retrying and prioritising tasks.

use super::Plan;
use crate::error::{PlanError, PlanResult};
use crate::types::TaskStatus;
use tracing::{debug, info};

impl Plan {
    /// Make `predecessor_id` a predecessor of `task_id` (and `task_id` a
    /// successor of `predecessor_id`).
    ///
    /// Rejects self-references and edges that would close a cycle. A `READY`
    /// task gaining an unfinished predecessor returns to `BACKLOG`.
    pub async fn add_predecessor(&mut self, task_id: &str, predecessor_id: &str) -> PlanResult<()> {
        if task_id == predecessor_id {
            return Err(PlanError::self_reference(task_id));
        }
        self.ensure_known(task_id)?;
        self.ensure_known(predecessor_id)?;
        self.ensure_loaded(task_id).await?;
        self.ensure_loaded(predecessor_id).await?;

        if self.loaded_ref(task_id)?.state().is_done() {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Cannot add a predecessor to completed task {}", task_id),
            ));
        }
        if self.reaches(&[task_id.to_string()], predecessor_id).await? {
            return Err(PlanError::dependency_cycle(predecessor_id, task_id));
        }

        let added = self
            .loaded_mut(task_id)?
            .task_predecessors
            .add(predecessor_id.to_string());
        self.loaded_mut(predecessor_id)?
            .task_successors
            .add(task_id.to_string());
        if !added {
            return Ok(());
        }
        self.loaded_mut(task_id)?.touch();
        self.mark_modified(task_id);
        self.mark_modified(predecessor_id);

        let predecessor_done = self.loaded_ref(predecessor_id)?.state().is_done();
        if !predecessor_done && self.loaded_ref(task_id)?.state() == TaskStatus::Ready {
            self.apply_state(task_id, TaskStatus::Backlog)?;
            debug!(task_id, predecessor_id, "demoted to backlog");
        }
        Ok(())
    }

    /// Close a task: `DONE`, out of the ready queue, into the done list, and
    /// every successor whose readiness now holds is queued at the back.
    ///
    /// If this was the last open subtask of a parent task, the parent is
    /// closed too and its id returned. Only one level is handled per call;
    /// pass the returned id to `propagate_subtask_completion` to go further.
    ///
    /// Closing a task that is already `DONE` does nothing.
    pub async fn close_task(&mut self, task_id: &str) -> PlanResult<Option<String>> {
        self.ensure_known(task_id)?;
        self.ensure_loaded(task_id).await?;
        if self.loaded_ref(task_id)?.state().is_done() {
            debug!(task_id, "close on a completed task ignored");
            return Ok(None);
        }
        if self.has_active_subtasks(task_id).await? {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Task {} still has unfinished subtasks", task_id),
            ));
        }

        self.complete(task_id).await?;
        info!(plan_id = %self.plan_id, task_id, "task closed");
        self.propagate_subtask_completion(task_id).await
    }

    /// If `task_id`'s parent task has no unfinished subtasks left, close it.
    /// Returns the closed parent id.
    pub async fn propagate_subtask_completion(&mut self, task_id: &str) -> PlanResult<Option<String>> {
        self.ensure_loaded(task_id).await?;
        let Some(parent_id) = self.loaded_ref(task_id)?.parent_task_id().map(str::to_string) else {
            return Ok(None);
        };
        self.ensure_loaded(&parent_id).await?;
        if self.loaded_ref(&parent_id)?.state().is_done() || self.has_active_subtasks(&parent_id).await? {
            return Ok(None);
        }

        self.complete(&parent_id).await?;
        info!(plan_id = %self.plan_id, task_id = %parent_id, "all subtasks done, parent closed");
        Ok(Some(parent_id))
    }

    /// Mark done and promote successors. The task must be loaded.
    pub(super) async fn complete(&mut self, task_id: &str) -> PlanResult<()> {
        self.apply_state(task_id, TaskStatus::Done)?;
        let successors = self.loaded_ref(task_id)?.task_successors.get_all_task_ids();
        for successor in &successors {
            self.promote_if_ready(successor).await?;
        }
        Ok(())
    }

    /// Retry a task by cloning it.
    ///
    /// The clone gets a fresh id, the original's goal, description,
    /// predecessors, successors and parent, and goes to the front of the
    /// ready queue. Each successor gains the clone as a predecessor, so it
    /// waits for the retry. The original task is left untouched.
    ///
    /// Fails with `INVALID_STATE` if the original's predecessors are not all
    /// done, as there would be nothing runnable to retry, or if its parent
    /// task is already `DONE` and its successors have moved on.
    pub async fn retry(&mut self, task_id: &str) -> PlanResult<String> {
        self.ensure_known(task_id)?;
        self.ensure_loaded(task_id).await?;

        let predecessors = self.loaded_ref(task_id)?.task_predecessors.get_all_task_ids();
        if self.resolve(&predecessors).await?.iter().any(|t| !t.state().is_done()) {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Task {} cannot be retried before its predecessors are done", task_id),
            ));
        }

        if let Some(parent_id) = self.loaded_ref(task_id)?.parent_task_id().map(str::to_string) {
            self.ensure_loaded(&parent_id).await?;
            if self.loaded_ref(&parent_id)?.state().is_done() {
                return Err(PlanError::invalid_state(
                    task_id,
                    format!("Task {} cannot be retried, its parent {} is DONE", task_id, parent_id),
                ));
            }
        }

        let original = self.loaded_ref(task_id)?;
        let clone = original.clone_with_new_id(&self.task_id_prefix);
        let parent_id = original
            .task_parent_id
            .clone()
            .unwrap_or_else(|| self.plan_id.clone());

        let clone_id = self.register(clone, parent_id.clone()).await?;
        if parent_id == self.plan_id {
            self.subtasks.add(clone_id.clone());
        } else {
            self.ensure_loaded(&parent_id).await?;
            self.loaded_mut(&parent_id)?.subtasks.add(clone_id.clone());
            self.mark_modified(&parent_id);
        }

        self.apply_state(&clone_id, TaskStatus::Ready)?;
        self.move_to_front(&clone_id);

        let attempt = self.loaded_ref(&clone_id)?.attempt;
        info!(plan_id = %self.plan_id, task_id, clone_id = %clone_id, attempt, "task retried");
        Ok(clone_id)
    }

    /// Put a task at the front of the ready queue, marking it `READY`.
    ///
    /// A task already queued moves to the front without duplication. Fails
    /// for completed tasks and for tasks whose predecessors or subtasks are
    /// not all done.
    pub async fn set_as_priority(&mut self, task_id: &str) -> PlanResult<()> {
        self.ensure_known(task_id)?;
        self.ensure_loaded(task_id).await?;
        if self.loaded_ref(task_id)?.state().is_done() {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Task {} is already DONE", task_id),
            ));
        }
        if !self.would_be_ready(task_id).await? {
            return Err(PlanError::invalid_state(
                task_id,
                format!("Task {} is waiting on unfinished predecessors or subtasks", task_id),
            ));
        }

        self.set_task_state(task_id, TaskStatus::Ready).await?;
        self.move_to_front(task_id);
        debug!(task_id, "prioritised");
        Ok(())
    }

    fn move_to_front(&mut self, task_id: &str) {
        self.ready.retain(|id| id != task_id);
        self.ready.insert(0, task_id.to_string());
    }
}
