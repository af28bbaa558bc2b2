//! Error types for task lifecycle operations
//!
//! Every failure here leaves the task set untouched. Callers surface the
//! message (status line, log) and carry on.

use crate::domain::{TaskId, TaskState};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    // Validation faults on task creation
    #[error("Task name must not be empty")]
    EmptyName,

    #[error("Estimate must be between {min} and {max} minutes (got {got})")]
    EstimateOutOfRange { got: u32, min: u32, max: u32 },

    #[error("Ambitious time must be positive")]
    AmbitiousNotPositive,

    #[error("Ambitious time ({ambitious}m) must be <= estimated time ({estimated}m)")]
    AmbitiousExceedsEstimate { ambitious: u32, estimated: u32 },

    #[error("Parent task not found: {0}")]
    UnknownParent(TaskId),

    // Logical preconditions
    #[error("No task focused")]
    NoFocusedTask,

    #[error("Cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskState, to: TaskState },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Last history entry is not {0}, refusing to undo")]
    HistoryMismatch(TaskId),

    #[error("No task above to attach to")]
    NoPrecedingTask,

    // Recoverable I/O
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TaskError {
    /// Wrap an anyhow chain from the persistence layer
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }

    /// Validation faults are the ones the input form should show next to the fields
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyName
                | Self::EstimateOutOfRange { .. }
                | Self::AmbitiousNotPositive
                | Self::AmbitiousExceedsEstimate { .. }
                | Self::UnknownParent(_)
        )
    }
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;
