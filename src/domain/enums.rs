use serde::{Deserialize, Serialize};

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created but never started (new tasks auto-start, so this is rare)
    Backlog,
    Ongoing,
    Paused,
    Completed,
}

impl TaskState {
    /// Convert state to its persisted tag
    pub fn to_tag(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Ongoing => "ongoing",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Short badge for list rendering
    pub fn badge(&self) -> &'static str {
        match self {
            Self::Backlog => "[BACKLOG]",
            Self::Ongoing => "[RUNNING]",
            Self::Paused => "[PAUSED]",
            Self::Completed => "[DONE]",
        }
    }

    /// Check if the task still belongs in the active set
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    /// Whether the transition table allows moving from `self` to `to`
    pub fn can_transition_to(&self, to: TaskState) -> bool {
        matches!(
            (self, to),
            (Self::Backlog, Self::Ongoing)
                | (Self::Paused, Self::Ongoing)
                | (Self::Ongoing, Self::Paused)
                | (Self::Ongoing, Self::Completed)
                | (Self::Paused, Self::Completed)
                | (Self::Completed, Self::Ongoing)
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_tag())
    }
}

/// UI mode for the terminal front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Normal,
    AddingTask,
    AddingSubtask,
}
