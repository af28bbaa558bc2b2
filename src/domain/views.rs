use super::enums::TaskState;
use super::task::{Task, TaskId};
use chrono::{DateTime, Local};
use std::collections::HashSet;

/// A flattened row for rendering the task list
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    /// Index in the active set
    pub index: usize,
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Indented under a parent that is still active
    pub is_subtask: bool,
    pub elapsed_seconds: f64,
    pub estimated_seconds: i64,
    pub ambitious_seconds: Option<i64>,
}

impl TaskRow {
    pub fn is_over_estimate(&self) -> bool {
        self.estimated_seconds > 0 && self.elapsed_seconds >= self.estimated_seconds as f64
    }

    pub fn is_within_ambitious(&self) -> bool {
        self.ambitious_seconds
            .map_or(false, |ambitious| self.elapsed_seconds <= ambitious as f64)
    }

    /// "12:34 / 30:00"
    pub fn time_label(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.elapsed_seconds),
            format_clock(self.estimated_seconds as f64)
        )
    }
}

/// Flatten the active set into display rows
pub fn task_rows(tasks: &[Task], now: DateTime<Local>) -> Vec<TaskRow> {
    let active_ids: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();

    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| TaskRow {
            index,
            id: task.id.clone(),
            name: task.name.clone(),
            state: task.state,
            is_subtask: task
                .parent_task_id
                .as_ref()
                .map_or(false, |parent| active_ids.contains(parent)),
            elapsed_seconds: task.compute_elapsed(now),
            estimated_seconds: task.estimated_seconds,
            ambitious_seconds: task.ambitious_seconds,
        })
        .collect()
}

/// Format seconds as "MM:SS", or "H:MM:SS" past an hour
pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Sum of elapsed and estimated time over the active set
pub fn compute_totals(rows: &[TaskRow]) -> (f64, i64) {
    rows.iter().fold((0.0, 0), |(elapsed, estimate), row| {
        (elapsed + row.elapsed_seconds, estimate + row.estimated_seconds)
    })
}
