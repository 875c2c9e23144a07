//! Run loop: drives a plan to completion with a pluggable executor.

use crate::config::RunnerConfig;
use crate::error::{PlanError, PlanResult};
use crate::plan::Plan;
use crate::task::Task;
use crate::types::TaskStatus;
use async_trait::async_trait;
use tracing::{info, warn};

/// Result of executing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded { output: String },
    Failed { output: String },
}

/// Whatever does the actual work of a task (a tool call, a model call...).
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> ExecutionOutcome;
}

/// Counters from one `Runner::run` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub succeeded: usize,
    pub retried: usize,
    /// True when the plan had no open task left at the end.
    pub completed: bool,
}

pub struct Runner<E> {
    executor: E,
    config: RunnerConfig,
}

impl<E: TaskExecutor> Runner<E> {
    pub fn new(executor: E, config: RunnerConfig) -> Self {
        Self { executor, config }
    }

    /// Execute tasks until the plan completes or `max_cycles` tasks ran.
    ///
    /// Each cycle: pick the next task, mark it `IN_PROGRESS`, execute it,
    /// store the output, then close it (cascading to parents whose subtasks
    /// are now all done) or, on failure, retry it by clone and close the
    /// failed original. The plan is saved after every cycle.
    ///
    /// Fails with `STALLED` if open tasks remain but none is actionable, and
    /// with `RETRY_LIMIT_EXCEEDED` once a task lineage reaches `max_attempts`.
    pub async fn run(&self, plan: &mut Plan) -> PlanResult<RunSummary> {
        let mut summary = RunSummary::default();
        let mut current: Option<String> = None;

        while summary.executed < self.config.max_cycles {
            let next = plan
                .get_next_task(current.as_deref())
                .await?
                .map(|t| t.task_id.clone());
            let Some(task_id) = next else {
                if plan.is_complete() {
                    break;
                }
                let open = plan.get_all_tasks_ids().len() - plan.get_all_done_tasks_ids().len();
                return Err(PlanError::stalled(open));
            };

            plan.set_task_state(&task_id, TaskStatus::InProgress).await?;
            let task = plan.get_task(&task_id).await?.clone();
            info!(plan_id = %plan.plan_id, task_id = %task_id, attempt = task.attempt, "executing task");

            let outcome = self.executor.execute(&task).await;
            summary.executed += 1;

            match outcome {
                ExecutionOutcome::Succeeded { output } => {
                    plan.set_task_output(&task_id, output).await?;
                    let mut closed = plan.close_task(&task_id).await?;
                    while let Some(parent_id) = closed {
                        closed = plan.propagate_subtask_completion(&parent_id).await?;
                    }
                    summary.succeeded += 1;
                }
                ExecutionOutcome::Failed { output } => {
                    plan.set_task_output(&task_id, output).await?;
                    if task.attempt >= self.config.max_attempts {
                        plan.db_save().await?;
                        return Err(PlanError::retry_limit(&task_id, task.attempt));
                    }
                    let clone_id = plan.retry(&task_id).await?;
                    warn!(task_id = %task_id, clone_id = %clone_id, "task failed, retrying");
                    plan.close_task(&task_id).await?;
                    summary.retried += 1;
                }
            }

            plan.db_save().await?;
            current = Some(task_id);
        }

        summary.completed = plan.is_complete();
        Ok(summary)
    }
}
