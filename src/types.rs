//! Core types shared by plans and tasks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a task.
///
/// ```text
/// BACKLOG --(predecessors & subtasks done)--> READY
/// READY --(run loop starts it)--> IN_PROGRESS
/// IN_PROGRESS --(subtasks spawned)--> IN_PROGRESS_WITH_SUBTASKS
/// IN_PROGRESS_WITH_SUBTASKS --(all subtasks done)--> DONE
/// any --(close)--> DONE
/// ```
///
/// There is no failed state: a failed execution leaves its output on the
/// task and is recovered by retrying into a fresh clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Ready,
    InProgress,
    InProgressWithSubtasks,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "BACKLOG",
            TaskStatus::Ready => "READY",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::InProgressWithSubtasks => "IN_PROGRESS_WITH_SUBTASKS",
            TaskStatus::Done => "DONE",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// States from which a task may be promoted to `READY`.
    pub fn is_promotable(&self) -> bool {
        matches!(
            self,
            TaskStatus::Backlog | TaskStatus::Ready | TaskStatus::InProgressWithSubtasks
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "BACKLOG" => Ok(TaskStatus::Backlog),
            "READY" => Ok(TaskStatus::Ready),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "IN_PROGRESS_WITH_SUBTASKS" => Ok(TaskStatus::InProgressWithSubtasks),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(format!("Unknown task status '{}'", other)),
        }
    }
}
