use crate::config::Settings;
use crate::domain::{Task, TaskId, TaskState};

/// An alarm threshold crossed during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Alarm {
    pub task_id: TaskId,
    pub level: u32,
}

/// Periodic timer that advances running tasks and escalates alarms.
///
/// Each tick adds a fixed increment rather than the measured wall-clock
/// delta, so results do not depend on scheduling jitter.
#[derive(Debug, Clone, Copy)]
pub struct TimerEngine {
    increment_secs: f64,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl TimerEngine {
    pub fn new(increment_secs: f64) -> Self {
        Self { increment_secs }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.tick_increment_secs())
    }

    /// Advance every ongoing task by one increment and collect the alarm
    /// thresholds crossed, in task order. `last_alarm_level` is raised as
    /// each alarm is reported so the same level never fires twice.
    pub fn tick(&self, tasks: &mut [Task]) -> Vec<Alarm> {
        let mut alarms = Vec::new();

        for task in tasks.iter_mut().filter(|t| t.state == TaskState::Ongoing) {
            task.elapsed_seconds += self.increment_secs;

            if let Some(level) = task.pending_alarm_level() {
                task.last_alarm_level = level;
                alarms.push(Alarm {
                    task_id: task.id.clone(),
                    level,
                });
            }
        }

        alarms
    }
}
