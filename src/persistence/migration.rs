use crate::domain::Task;
use anyhow::{Context, Result};
use serde_json::Value;

/// Decode one persisted record, filling defaults for fields older
/// versions did not write and dropping values that break invariants.
pub fn task_from_record(record: Value) -> Result<Task> {
    let id = record_id(&record);
    let mut task: Task = serde_json::from_value(record)
        .with_context(|| format!("Invalid task record {}", id.as_deref().unwrap_or("<no id>")))?;

    if task.name.trim().is_empty() {
        anyhow::bail!("Task {} has an empty name", task.id);
    }

    if let Some(ambitious) = task.ambitious_seconds {
        if ambitious <= 0 || ambitious > task.estimated_seconds {
            tracing::warn!(
                task_id = %task.id,
                ambitious,
                estimated = task.estimated_seconds,
                "Dropping ambitious time outside the estimate"
            );
            task.ambitious_seconds = None;
        }
    }

    if task.parent_task_id.as_ref() == Some(&task.id) {
        task.parent_task_id = None;
    }

    Ok(task)
}

/// Decode the active-set array, skipping records that fail
pub fn active_tasks_from_records(records: Vec<Value>) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(records.len());

    for record in records {
        match task_from_record(record) {
            Ok(task) if !task.state.is_active() => {
                tracing::warn!(task_id = %task.id, "Skipping completed task found in active set");
            }
            Ok(task) => tasks.push(task),
            Err(e) => tracing::warn!("Failed to load task: {:#}", e),
        }
    }

    tasks
}

/// Extract the id of a raw record without decoding the rest
pub fn record_id(record: &Value) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}
