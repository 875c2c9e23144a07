//! Structured error types for plan and task operations.

use crate::db::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Structural errors (data-integrity bugs)
    DuplicateTask,
    SelfReference,
    DependencyCycle,
    UnknownTask,
    InvalidState,

    // Not found errors
    TaskNotFound,
    PlanNotFound,

    // Infrastructure errors
    StoreError,
    SerializationError,

    // Run loop errors
    RetryLimitExceeded,
    Stalled,
}

/// Structured error raised by the plan/task layer.
#[derive(Debug, Error, Serialize)]
#[error("{message}")]
pub struct PlanError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PlanError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            task_id: None,
            details: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn duplicate_task(task_id: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateTask,
            format!("Task {} is already registered in this plan", task_id),
        )
        .with_task(task_id)
    }

    pub fn self_reference(task_id: &str) -> Self {
        Self::new(
            ErrorCode::SelfReference,
            format!("Task {} cannot be its own predecessor or successor", task_id),
        )
        .with_task(task_id)
    }

    pub fn dependency_cycle(predecessor: &str, task_id: &str) -> Self {
        Self::new(
            ErrorCode::DependencyCycle,
            format!(
                "Making {} a predecessor of {} would create a cycle",
                predecessor, task_id
            ),
        )
        .with_task(task_id)
    }

    pub fn unknown_task(task_id: &str) -> Self {
        Self::new(
            ErrorCode::UnknownTask,
            format!("Task {} is not registered in this plan", task_id),
        )
        .with_task(task_id)
    }

    pub fn invalid_state(task_id: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, reason).with_task(task_id)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
        .with_task(task_id)
    }

    pub fn plan_not_found(plan_id: &str) -> Self {
        Self::new(
            ErrorCode::PlanNotFound,
            format!("Plan not found: {}", plan_id),
        )
    }

    pub fn retry_limit(task_id: &str, attempts: u32) -> Self {
        Self::new(
            ErrorCode::RetryLimitExceeded,
            format!("Task {} failed after {} attempts", task_id, attempts),
        )
        .with_task(task_id)
    }

    pub fn stalled(remaining: usize) -> Self {
        Self::new(
            ErrorCode::Stalled,
            format!("No actionable task found with {} task(s) still open", remaining),
        )
    }

    /// True for errors a caller may legitimately handle (absent ids).
    pub fn is_not_found(&self) -> bool {
        matches!(self.code, ErrorCode::TaskNotFound | ErrorCode::PlanNotFound)
    }

    /// True for programmer or data-integrity errors.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::DuplicateTask
                | ErrorCode::SelfReference
                | ErrorCode::DependencyCycle
                | ErrorCode::UnknownTask
                | ErrorCode::InvalidState
        )
    }
}

impl From<StoreError> for PlanError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(msg) => Self::new(ErrorCode::SerializationError, msg),
            other => Self::new(ErrorCode::StoreError, other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, err.to_string())
    }
}

/// Result type for plan operations.
pub type PlanResult<T> = std::result::Result<T, PlanError>;
