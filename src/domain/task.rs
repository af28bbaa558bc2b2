use super::enums::TaskState;
use super::timestamp;
use crate::config::{MAX_TASK_MINUTES, MIN_TASK_MINUTES};
use crate::error::{TaskError, TaskResult};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stretch of work; `end` is `None` while the task is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkInterval {
    #[serde(with = "timestamp")]
    pub start: DateTime<Local>,
    #[serde(default, with = "timestamp::option")]
    pub end: Option<DateTime<Local>>,
}

impl WorkInterval {
    pub fn open(start: DateTime<Local>) -> Self {
        Self { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Length in seconds; open intervals run until `now`
    pub fn duration_secs(&self, now: DateTime<Local>) -> f64 {
        let end = self.end.unwrap_or(now);
        let millis = end.signed_duration_since(self.start).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }
}

/// A tracked unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub estimated_seconds: i64,
    #[serde(default = "default_state")]
    pub state: TaskState,
    /// Tick accumulator. Advanced by the ticker, re-synced from the
    /// intervals whenever one closes. Records without intervals rely on it.
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default = "Local::now", with = "timestamp")]
    pub created_at: DateTime<Local>,
    #[serde(default, with = "timestamp::option")]
    pub started_at: Option<DateTime<Local>>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Local>>,
    #[serde(default)]
    pub ambitious_seconds: Option<i64>,
    #[serde(default)]
    pub last_alarm_level: u32,
    #[serde(default)]
    pub work_intervals: Vec<WorkInterval>,
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
}

fn default_state() -> TaskState {
    TaskState::Ongoing
}

/// Check the fields of a new-task request before anything is created
pub fn validate_new_task(name: &str, estimated_minutes: u32, ambitious_minutes: Option<u32>) -> TaskResult<()> {
    if name.trim().is_empty() {
        return Err(TaskError::EmptyName);
    }

    if !(MIN_TASK_MINUTES..=MAX_TASK_MINUTES).contains(&estimated_minutes) {
        return Err(TaskError::EstimateOutOfRange {
            got: estimated_minutes,
            min: MIN_TASK_MINUTES,
            max: MAX_TASK_MINUTES,
        });
    }

    match ambitious_minutes {
        Some(0) => Err(TaskError::AmbitiousNotPositive),
        Some(ambitious) if ambitious > estimated_minutes => Err(TaskError::AmbitiousExceedsEstimate {
            ambitious,
            estimated: estimated_minutes,
        }),
        _ => Ok(()),
    }
}

impl Task {
    /// Build a backlog task from a validated request
    pub fn new(name: &str, estimated_minutes: u32, ambitious_minutes: Option<u32>, parent_task_id: Option<TaskId>) -> Self {
        Self {
            id: TaskId::generate(),
            name: name.trim().to_string(),
            estimated_seconds: i64::from(estimated_minutes) * 60,
            state: TaskState::Backlog,
            elapsed_seconds: 0.0,
            created_at: Local::now(),
            started_at: None,
            completed_at: None,
            ambitious_seconds: ambitious_minutes.map(|m| i64::from(m) * 60),
            last_alarm_level: 0,
            work_intervals: Vec::new(),
            parent_task_id,
        }
    }

    pub fn has_open_interval(&self) -> bool {
        self.work_intervals.iter().any(WorkInterval::is_open)
    }

    /// Open a new work interval. Returns false if one is already open.
    pub fn start_interval_at(&mut self, now: DateTime<Local>) -> bool {
        if self.has_open_interval() {
            return false;
        }

        // Legacy records only carry a scalar; keep that time as a closed interval
        if self.work_intervals.is_empty() && self.elapsed_seconds > 0.0 {
            let carried = Duration::milliseconds((self.elapsed_seconds * 1000.0).round() as i64);
            self.work_intervals.push(WorkInterval {
                start: now - carried,
                end: Some(now),
            });
        }

        self.work_intervals.push(WorkInterval::open(now));
        true
    }

    /// Close the open interval, if any
    pub fn end_interval_at(&mut self, now: DateTime<Local>) {
        if let Some(interval) = self.work_intervals.iter_mut().find(|i| i.is_open()) {
            interval.end = Some(now.max(interval.start));
        }
    }

    /// Elapsed work time at `now`: closed intervals plus the running one,
    /// or the stored scalar for records that predate intervals
    pub fn compute_elapsed(&self, now: DateTime<Local>) -> f64 {
        if self.work_intervals.is_empty() {
            return self.elapsed_seconds;
        }
        self.work_intervals.iter().map(|i| i.duration_secs(now)).sum()
    }

    /// Re-sync the tick accumulator from the intervals
    pub fn sync_elapsed(&mut self, now: DateTime<Local>) {
        if !self.work_intervals.is_empty() {
            self.elapsed_seconds = self.compute_elapsed(now);
        }
    }

    fn check_transition(&self, to: TaskState) -> TaskResult<()> {
        if self.state.can_transition_to(to) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition { from: self.state, to })
        }
    }

    /// Backlog/Paused -> Ongoing
    pub fn resume_at(&mut self, now: DateTime<Local>) -> TaskResult<()> {
        if self.state == TaskState::Completed {
            return Err(TaskError::InvalidTransition {
                from: self.state,
                to: TaskState::Ongoing,
            });
        }
        self.check_transition(TaskState::Ongoing)?;
        self.state = TaskState::Ongoing;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.start_interval_at(now);
        Ok(())
    }

    /// Ongoing -> Paused; alarms re-arm after the next resume
    pub fn pause_at(&mut self, now: DateTime<Local>) -> TaskResult<()> {
        self.check_transition(TaskState::Paused)?;
        self.end_interval_at(now);
        self.sync_elapsed(now);
        self.state = TaskState::Paused;
        self.last_alarm_level = 0;
        Ok(())
    }

    /// Ongoing/Paused -> Completed
    pub fn complete_at(&mut self, now: DateTime<Local>) -> TaskResult<()> {
        self.check_transition(TaskState::Completed)?;
        self.end_interval_at(now);
        self.sync_elapsed(now);
        self.state = TaskState::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Completed -> Ongoing (undo of a completion)
    pub fn reopen_at(&mut self, now: DateTime<Local>) -> TaskResult<()> {
        if self.state != TaskState::Completed {
            return Err(TaskError::InvalidTransition {
                from: self.state,
                to: TaskState::Ongoing,
            });
        }
        self.state = TaskState::Ongoing;
        self.completed_at = None;
        self.start_interval_at(now);
        Ok(())
    }

    /// Alarm level due for this task, if it crossed a new threshold.
    ///
    /// Level is `max(1, floor(elapsed / estimate))` once the estimate is
    /// reached, and only reported when above `last_alarm_level`.
    pub fn pending_alarm_level(&self) -> Option<u32> {
        if self.state != TaskState::Ongoing || self.estimated_seconds <= 0 {
            return None;
        }

        let ratio = self.elapsed_seconds / self.estimated_seconds as f64;
        if ratio < 1.0 {
            return None;
        }

        let level = (ratio.floor() as u32).max(1);
        (level > self.last_alarm_level).then_some(level)
    }

    /// Whether the current elapsed time fits the ambitious budget
    pub fn within_ambitious(&self) -> bool {
        self.ambitious_seconds
            .map_or(false, |ambitious| self.elapsed_seconds <= ambitious as f64)
    }

    /// Restore the open-interval invariant on a freshly loaded record
    pub fn normalize(&mut self, now: DateTime<Local>) {
        match self.state {
            TaskState::Ongoing => {
                if !self.has_open_interval() {
                    self.start_interval_at(now);
                }
            }
            _ => self.end_interval_at(now),
        }

        // Keep only the latest open interval if a hand-edited file has several
        let open_count = self.work_intervals.iter().filter(|i| i.is_open()).count();
        if open_count > 1 {
            let mut seen = 0;
            for interval in self.work_intervals.iter_mut().rev() {
                if interval.is_open() {
                    seen += 1;
                    if seen > 1 {
                        interval.end = Some(interval.start);
                    }
                }
            }
        }

        self.sync_elapsed(now);
    }
}
