use super::files::{append_line, atomic_write, read_file};
use super::migration::{active_tasks_from_records, record_id, task_from_record};
use crate::config::{Config, ACTIVE_FILE_NAME, HISTORY_FILE_NAME};
use crate::domain::{Task, TaskId};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File-backed storage for the active set (active.json) and the
/// completion log (history.jsonl)
#[derive(Debug, Clone)]
pub struct TaskStore {
    active_path: PathBuf,
    history_path: PathBuf,
}

impl TaskStore {
    pub fn new(active_path: PathBuf, history_path: PathBuf) -> Self {
        Self {
            active_path,
            history_path,
        }
    }

    /// Store using the default file names inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(ACTIVE_FILE_NAME), dir.join(HISTORY_FILE_NAME))
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.active_file(), config.history_file())
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Load the active set. Never fails: a missing file is an empty set,
    /// a malformed file is logged and treated as empty, and individual
    /// records that fail to decode are skipped.
    pub fn load_active(&self) -> Vec<Task> {
        let path = &self.active_path;
        if !path.exists() {
            return Vec::new();
        }

        let content = match read_file(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("{:#}, starting fresh", e);
                return Vec::new();
            }
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}, starting fresh", path.display(), e);
                return Vec::new();
            }
        };

        match value {
            Value::Array(records) => {
                let total = records.len();
                let tasks = active_tasks_from_records(records);
                tracing::debug!("Loaded {}/{} active tasks from {}", tasks.len(), total, path.display());
                tasks
            }
            _ => {
                tracing::warn!("{} is not a list, starting fresh", path.display());
                Vec::new()
            }
        }
    }

    /// Replace the active-set file atomically
    pub fn save_active(&self, tasks: &[Task]) -> Result<()> {
        let json = serde_json::to_string_pretty(tasks).context("Failed to serialize active tasks")?;
        atomic_write(&self.active_path, &json)
    }

    /// Append one completed task to the history log
    pub fn append_history(&self, task: &Task) -> Result<()> {
        let line = serde_json::to_string(task).context("Failed to serialize history entry")?;
        append_line(&self.history_path, &line)
    }

    /// Remove the last history entry, but only if it belongs to `expected_id`.
    ///
    /// Returns `Ok(false)` and leaves the file untouched when the log is
    /// missing, empty, or ends with a different (or unreadable) entry.
    pub fn remove_last_history_entry(&self, expected_id: &TaskId) -> Result<bool> {
        let path = &self.history_path;
        if !path.exists() {
            return Ok(false);
        }

        let content = read_file(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let Some(last_idx) = lines.iter().rposition(|line| !line.trim().is_empty()) else {
            return Ok(false);
        };

        let tail_id = serde_json::from_str::<Value>(lines[last_idx])
            .ok()
            .as_ref()
            .and_then(record_id);
        if tail_id.as_deref() != Some(expected_id.as_str()) {
            tracing::warn!(
                expected = %expected_id,
                found = tail_id.as_deref().unwrap_or("<unreadable>"),
                "History tail does not match undo target"
            );
            return Ok(false);
        }

        let mut remaining = lines[..last_idx].join("\n");
        if !remaining.is_empty() {
            remaining.push('\n');
        }
        atomic_write(path, &remaining)
            .with_context(|| format!("Failed to rewrite {}", path.display()))?;

        Ok(true)
    }

    /// Every readable history entry, oldest first. Corrupt lines are skipped.
    pub fn load_history(&self) -> Vec<Task> {
        let content = match read_file(&self.history_path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("{:#}", e);
                return Vec::new();
            }
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(line_no, line)| {
                let parsed = serde_json::from_str::<Value>(line)
                    .map_err(anyhow::Error::from)
                    .and_then(task_from_record);
                match parsed {
                    Ok(task) => Some(task),
                    Err(e) => {
                        tracing::debug!("Skipping history line {}: {:#}", line_no + 1, e);
                        None
                    }
                }
            })
            .collect()
    }
}
