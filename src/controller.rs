//! Task controller: owns the active set, the focus cursor and the alarm
//! set, and is the only place that mutates them.
//!
//! Every successful mutation is persisted through the [`TaskStore`] and
//! announced on the [`EventBus`]. Failures never leave partial changes
//! behind, with one exception: storage faults after an in-memory change
//! are logged and kept in `storage_error`, and the in-memory state stays
//! authoritative until the next successful save.

use crate::domain::{validate_new_task, Task, TaskId, TaskState};
use crate::error::{TaskError, TaskResult};
use crate::events::{Event, EventBus};
use crate::persistence::TaskStore;
use crate::ticker::TimerEngine;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::sync::mpsc::Receiver;

/// The most recent completion, kept so it can be undone once
#[derive(Debug, Clone)]
struct Completion {
    task: Task,
    index: usize,
}

pub struct TaskController {
    tasks: Vec<Task>,
    focus: Option<usize>,
    alarms: HashSet<TaskId>,
    /// Tasks paused by the last system sleep, resumed on wake
    sleep_paused: Vec<TaskId>,
    last_completion: Option<Completion>,
    store: TaskStore,
    engine: TimerEngine,
    events: EventBus,
    storage_error: Option<TaskError>,
}

impl TaskController {
    /// Load the active set from `store` and restore the interval invariants
    pub fn load(store: TaskStore, engine: TimerEngine) -> Self {
        let now = Local::now();
        let mut tasks = store.load_active();
        for task in &mut tasks {
            task.normalize(now);
        }

        tracing::info!(
            "Loaded {} active tasks from {}",
            tasks.len(),
            store.active_path().display()
        );

        let focus = (!tasks.is_empty()).then_some(0);
        Self {
            tasks,
            focus,
            alarms: HashSet::new(),
            sleep_paused: Vec::new(),
            last_completion: None,
            store,
            engine,
            events: EventBus::new(),
            storage_error: None,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<Event> {
        self.events.subscribe()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn focused_task(&self) -> Option<&Task> {
        self.focus.and_then(|i| self.tasks.get(i))
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn is_alarmed(&self, id: &TaskId) -> bool {
        self.alarms.contains(id)
    }

    pub fn has_alarms(&self) -> bool {
        !self.alarms.is_empty()
    }

    /// Name of the task an undo would restore
    pub fn undo_candidate(&self) -> Option<&str> {
        self.last_completion.as_ref().map(|c| c.task.name.as_str())
    }

    /// Last storage fault since the previous call, if any
    pub fn take_storage_error(&mut self) -> Option<TaskError> {
        self.storage_error.take()
    }

    /// Create a task and start it immediately.
    ///
    /// A subtask is placed after its parent and the parent's existing
    /// subtasks; anything else is appended. Nesting is one level deep, so
    /// a subtask given as parent resolves to its own parent.
    pub fn new_task(
        &mut self,
        name: &str,
        estimated_minutes: u32,
        ambitious_minutes: Option<u32>,
        parent: Option<TaskId>,
    ) -> TaskResult<TaskId> {
        validate_new_task(name, estimated_minutes, ambitious_minutes)?;

        let placement = match parent {
            Some(parent_id) => {
                let idx = self
                    .index_of(&parent_id)
                    .ok_or(TaskError::UnknownParent(parent_id))?;
                let root = self.root_of(idx);
                let root_idx = self.index_of(&root).unwrap_or(idx);
                Some((root, self.subtask_insert_position(root_idx)))
            }
            None => None,
        };

        let now = Local::now();
        let mut task = Task::new(name, estimated_minutes, ambitious_minutes, None);
        task.parent_task_id = placement.as_ref().map(|(root, _)| root.clone());
        task.resume_at(now)?;
        let id = task.id.clone();

        let position = match placement {
            Some((_, position)) if position < self.tasks.len() => {
                self.tasks.insert(position, task);
                self.events.emit(Event::TaskInserted {
                    task_id: id.clone(),
                    position,
                });
                if let Some(focus) = self.focus.filter(|f| *f >= position) {
                    self.set_focus(Some(focus + 1));
                }
                position
            }
            _ => {
                self.tasks.push(task);
                let position = self.tasks.len() - 1;
                self.events.emit(Event::TaskAdded {
                    task_id: id.clone(),
                    position,
                });
                position
            }
        };

        if self.focus.is_none() {
            self.set_focus(Some(position));
        }

        tracing::info!(task_id = %id, position, "Created task '{}'", name.trim());
        self.persist();
        Ok(id)
    }

    /// Backlog/Paused -> Ongoing for the focused task
    pub fn start_or_resume(&mut self) -> TaskResult<()> {
        let idx = self.focus_index()?;
        let task = &mut self.tasks[idx];
        task.resume_at(Local::now())?;
        let id = task.id.clone();

        self.sleep_paused.retain(|sid| sid != &id);
        tracing::info!(task_id = %id, "Resumed task");
        self.events.emit(Event::TaskUpdated { task_id: id });
        self.persist();
        Ok(())
    }

    /// Ongoing -> Paused for the focused task; its alarm is acknowledged
    pub fn pause(&mut self) -> TaskResult<()> {
        let idx = self.focus_index()?;
        let task = &mut self.tasks[idx];
        task.pause_at(Local::now())?;
        let id = task.id.clone();

        tracing::info!(task_id = %id, elapsed = task.elapsed_seconds, "Paused task");
        self.clear_alarm(&id);
        self.events.emit(Event::TaskUpdated { task_id: id });
        self.persist();
        Ok(())
    }

    pub fn toggle_start_pause(&mut self) -> TaskResult<()> {
        match self.focused_task().map(|t| t.state) {
            Some(TaskState::Ongoing) => self.pause(),
            Some(_) => self.start_or_resume(),
            None => Err(TaskError::NoFocusedTask),
        }
    }

    /// Complete the focused task and move it to history.
    ///
    /// The history record is written first; if that fails the task stays
    /// where it was, untouched. Returns whether it finished within its
    /// ambitious time.
    pub fn complete(&mut self) -> TaskResult<bool> {
        let idx = self.focus_index()?;
        let mut task = self.tasks[idx].clone();
        task.complete_at(Local::now())?;

        if let Err(e) = self.store.append_history(&task) {
            let err = TaskError::storage(e.context("Failed to append to history"));
            tracing::warn!(task_id = %task.id, "{}", err);
            return Err(err);
        }

        self.tasks.remove(idx);
        let id = task.id.clone();
        let within_ambitious = task.within_ambitious();

        self.clear_alarm(&id);
        self.sleep_paused.retain(|sid| sid != &id);

        tracing::info!(
            task_id = %id,
            elapsed = task.elapsed_seconds,
            estimated = task.estimated_seconds,
            within_ambitious,
            "Completed task '{}'",
            task.name
        );

        self.events.emit(Event::TaskRemoved {
            task_id: id.clone(),
            position: idx,
        });
        self.events.emit(Event::TaskCompleted {
            task_id: id,
            name: task.name.clone(),
            within_ambitious,
        });
        self.last_completion = Some(Completion { task, index: idx });

        let focus = match self.tasks.len() {
            0 => None,
            len => Some(idx.min(len - 1)),
        };
        self.set_focus(focus);

        self.persist();
        Ok(within_ambitious)
    }

    /// Reverse the most recent completion.
    ///
    /// Only allowed while the history log still ends with that task; once
    /// it doesn't, the record is dropped. The task goes back to its old
    /// index (clamped to the set size, and kept inside its parent's group),
    /// resumes with a fresh interval, and takes focus.
    pub fn undo_last_completion(&mut self) -> TaskResult<TaskId> {
        let Some(completion) = self.last_completion.take() else {
            return Err(TaskError::NothingToUndo);
        };
        let id = completion.task.id.clone();

        match self.store.remove_last_history_entry(&id) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(task_id = %id, "History no longer ends with the completed task");
                return Err(TaskError::HistoryMismatch(id));
            }
            Err(e) => {
                self.last_completion = Some(completion);
                return Err(TaskError::storage(e));
            }
        }

        let Completion { mut task, index } = completion;
        task.reopen_at(Local::now())?;

        let position = self.restore_position(&task, index);
        self.tasks.insert(position, task);
        self.events.emit(Event::TaskInserted {
            task_id: id.clone(),
            position,
        });
        self.set_focus(Some(position));

        tracing::info!(task_id = %id, position, "Undid completion");
        self.persist();
        Ok(id)
    }

    /// Link the focused task under the task above it, or unlink it.
    ///
    /// An unlinked subtask moves below its former siblings so they stay
    /// grouped under their parent. Returns the new parent, or `None` when
    /// the link was removed.
    pub fn toggle_subtask(&mut self) -> TaskResult<Option<TaskId>> {
        let idx = self.focus_index()?;

        if let Some(old_parent) = self.tasks[idx].parent_task_id.clone() {
            self.promote_subtask(idx, &old_parent);
            return Ok(None);
        }

        if idx == 0 {
            return Err(TaskError::NoPrecedingTask);
        }

        let parent_id = self.root_of(idx - 1);
        let own_id = self.tasks[idx].id.clone();

        // One level deep: our own subtasks follow us under the new parent
        let mut touched = vec![own_id.clone()];
        for task in self.tasks.iter_mut() {
            if task.parent_task_id.as_ref() == Some(&own_id) {
                task.parent_task_id = Some(parent_id.clone());
                touched.push(task.id.clone());
            }
        }
        self.tasks[idx].parent_task_id = Some(parent_id.clone());

        tracing::info!(task_id = %own_id, parent = %parent_id, "Made task a subtask");
        for task_id in touched {
            self.events.emit(Event::TaskUpdated { task_id });
        }
        self.persist();
        Ok(Some(parent_id))
    }

    /// Move the focus cursor by `delta`, wrapping at both ends
    pub fn move_focus(&mut self, delta: i32) {
        if self.tasks.is_empty() || delta == 0 {
            return;
        }

        let len = self.tasks.len() as i64;
        let next = match self.focus {
            Some(current) => (current as i64 + i64::from(delta)).rem_euclid(len),
            None if delta > 0 => 0,
            None => len - 1,
        };
        self.set_focus(Some(next as usize));
    }

    pub fn on_system_sleep(&mut self) {
        self.on_system_sleep_at(Local::now());
    }

    /// Pause every running task as of `at` and remember which ones
    pub fn on_system_sleep_at(&mut self, at: DateTime<Local>) {
        let mut paused = Vec::new();
        for task in self.tasks.iter_mut().filter(|t| t.state == TaskState::Ongoing) {
            if task.pause_at(at).is_ok() {
                paused.push(task.id.clone());
            }
        }

        if !self.alarms.is_empty() {
            self.alarms.clear();
            self.events.emit(Event::AlarmsCleared);
        }

        if paused.is_empty() {
            return;
        }

        tracing::info!("System sleep: paused {} running tasks", paused.len());
        for id in &paused {
            self.events.emit(Event::TaskUpdated { task_id: id.clone() });
            if !self.sleep_paused.contains(id) {
                self.sleep_paused.push(id.clone());
            }
        }
        self.persist();
    }

    pub fn on_system_wake(&mut self) {
        self.on_system_wake_at(Local::now());
    }

    /// Resume the tasks the last sleep paused, if they are still paused
    pub fn on_system_wake_at(&mut self, now: DateTime<Local>) {
        let remembered = std::mem::take(&mut self.sleep_paused);
        let mut resumed = Vec::new();

        for id in remembered {
            let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
                continue;
            };
            if task.state == TaskState::Paused && task.resume_at(now).is_ok() {
                resumed.push(id);
            }
        }

        if resumed.is_empty() {
            return;
        }

        tracing::info!("System wake: resumed {} tasks", resumed.len());
        for task_id in resumed {
            self.events.emit(Event::TaskUpdated { task_id });
        }
        self.persist();
    }

    /// Acknowledge every alarm without touching task state
    pub fn dismiss_all_alarms(&mut self) {
        if !self.alarms.is_empty() {
            tracing::debug!("Dismissed {} alarms", self.alarms.len());
        }
        self.alarms.clear();
        self.events.emit(Event::AlarmsCleared);
    }

    /// Advance running tasks by one increment and raise due alarms
    pub fn tick(&mut self) {
        let alarms = self.engine.tick(&mut self.tasks);

        for alarm in &alarms {
            tracing::info!(task_id = %alarm.task_id, level = alarm.level, "Alarm");
            self.alarms.insert(alarm.task_id.clone());
            self.events.emit(Event::AlarmTriggered {
                task_id: alarm.task_id.clone(),
                level: alarm.level,
            });
        }

        if !alarms.is_empty() {
            self.persist();
        }

        self.events.emit(Event::Tick);
    }

    /// Re-sync elapsed time from the intervals and write the active set
    pub fn save(&mut self) -> TaskResult<()> {
        let now = Local::now();
        for task in &mut self.tasks {
            task.sync_elapsed(now);
        }
        self.store.save_active(&self.tasks).map_err(TaskError::storage)
    }

    fn promote_subtask(&mut self, idx: usize, old_parent: &TaskId) {
        let mut task = self.tasks.remove(idx);
        task.parent_task_id = None;
        let id = task.id.clone();

        let position = match self.index_of(old_parent) {
            Some(parent_idx) => self.subtask_insert_position(parent_idx),
            None => idx,
        };
        self.tasks.insert(position, task);

        tracing::info!(task_id = %id, position, "Promoted subtask to top level");
        if position == idx {
            self.events.emit(Event::TaskUpdated { task_id: id });
        } else {
            self.events.emit(Event::TaskRemoved {
                task_id: id.clone(),
                position: idx,
            });
            self.events.emit(Event::TaskInserted {
                task_id: id,
                position,
            });
            self.set_focus(Some(position));
        }
        self.persist();
    }

    fn focus_index(&self) -> TaskResult<usize> {
        self.focus
            .filter(|i| *i < self.tasks.len())
            .ok_or(TaskError::NoFocusedTask)
    }

    fn index_of(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    /// Top-level task for the one at `idx`; parents outside the set don't count
    fn root_of(&self, idx: usize) -> TaskId {
        let task = &self.tasks[idx];
        match &task.parent_task_id {
            Some(parent) if self.index_of(parent).is_some() => parent.clone(),
            _ => task.id.clone(),
        }
    }

    fn subtask_insert_position(&self, parent_idx: usize) -> usize {
        let parent_id = &self.tasks[parent_idx].id;
        let mut position = parent_idx + 1;
        while position < self.tasks.len()
            && self.tasks[position].parent_task_id.as_ref() == Some(parent_id)
        {
            position += 1;
        }
        position
    }

    /// Subtask whose parent is still in the active set
    fn is_linked_subtask(&self, idx: usize) -> bool {
        self.tasks[idx]
            .parent_task_id
            .as_ref()
            .is_some_and(|parent| self.index_of(parent).is_some())
    }

    /// Slot for a task coming back at `index` that splits no subtask group
    fn restore_position(&self, task: &Task, index: usize) -> usize {
        let index = index.min(self.tasks.len());

        if let Some(parent_idx) = task.parent_task_id.as_ref().and_then(|p| self.index_of(p)) {
            let group_end = self.subtask_insert_position(parent_idx);
            return if (parent_idx + 1..=group_end).contains(&index) {
                index
            } else {
                group_end
            };
        }

        let mut position = index;
        while position < self.tasks.len() && self.is_linked_subtask(position) {
            position += 1;
        }
        position
    }

    fn set_focus(&mut self, focus: Option<usize>) {
        self.focus = focus;
        self.events.emit(Event::FocusChanged(focus));
    }

    fn clear_alarm(&mut self, id: &TaskId) {
        if self.alarms.remove(id) && self.alarms.is_empty() {
            self.events.emit(Event::AlarmsCleared);
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save_active(&self.tasks) {
            self.report_storage(e);
        }
    }

    fn report_storage(&mut self, err: anyhow::Error) {
        let err = TaskError::storage(err);
        tracing::warn!("{}", err);
        self.storage_error = Some(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn controller() -> (TempDir, TaskController) {
        let dir = tempdir().unwrap();
        let store = TaskStore::in_dir(dir.path());
        (dir, TaskController::load(store, TimerEngine::new(1.0)))
    }

    fn names(ctl: &TaskController) -> Vec<&str> {
        ctl.tasks().iter().map(|t| t.name.as_str()).collect()
    }

    fn history_lines(ctl: &TaskController) -> usize {
        fs::read_to_string(ctl.store.history_path())
            .map(|c| c.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0)
    }

    #[test]
    fn test_new_task_starts_immediately_and_takes_focus() {
        let (_dir, mut ctl) = controller();
        let rx = ctl.subscribe();

        let id = ctl.new_task("Write report", 30, Some(20), None).unwrap();

        let task = &ctl.tasks()[0];
        assert_eq!(task.id, id);
        assert_eq!(task.state, TaskState::Ongoing);
        assert!(task.has_open_interval());
        assert_eq!(task.ambitious_seconds, Some(1200));
        assert_eq!(ctl.focus(), Some(0));

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                Event::TaskAdded { task_id: id, position: 0 },
                Event::FocusChanged(Some(0)),
            ]
        );

        assert_eq!(ctl.store.load_active().len(), 1);
    }

    #[test]
    fn test_new_task_validation_rejects_without_mutation() {
        let (_dir, mut ctl) = controller();

        assert!(matches!(
            ctl.new_task("Too ambitious", 30, Some(45), None),
            Err(TaskError::AmbitiousExceedsEstimate { .. })
        ));
        assert!(matches!(
            ctl.new_task("Zero", 0, None, None),
            Err(TaskError::EstimateOutOfRange { .. })
        ));
        assert_eq!(ctl.new_task("  ", 10, None, None), Err(TaskError::EmptyName));
        assert!(ctl.tasks().is_empty());
        assert!(!ctl.store.active_path().exists());

        assert!(ctl.new_task("Fine", 30, Some(20), None).is_ok());
        assert_eq!(ctl.tasks().len(), 1);
    }

    #[test]
    fn test_unknown_parent_is_rejected() {
        let (_dir, mut ctl) = controller();
        let err = ctl
            .new_task("Orphan", 5, None, Some(TaskId::from("missing")))
            .unwrap_err();
        assert_eq!(err, TaskError::UnknownParent(TaskId::from("missing")));
        assert!(ctl.tasks().is_empty());
    }

    #[test]
    fn test_subtasks_are_placed_after_parent_group() {
        let (_dir, mut ctl) = controller();
        let a = ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();
        ctl.move_focus(1);
        assert_eq!(ctl.focus(), Some(1));

        let s1 = ctl.new_task("A.1", 5, None, Some(a.clone())).unwrap();
        // Naming a subtask as parent nests under its root
        ctl.new_task("A.2", 5, None, Some(s1)).unwrap();

        assert_eq!(names(&ctl), vec!["A", "A.1", "A.2", "B"]);
        assert_eq!(ctl.tasks()[2].parent_task_id, Some(a));
        // Focus stayed on B as it moved down
        assert_eq!(ctl.focused_task().unwrap().name, "B");
    }

    #[test]
    fn test_pause_and_resume_toggle() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("Focus", 10, None, None).unwrap();

        ctl.toggle_start_pause().unwrap();
        let task = &ctl.tasks()[0];
        assert_eq!(task.state, TaskState::Paused);
        assert!(!task.has_open_interval());

        ctl.toggle_start_pause().unwrap();
        let task = &ctl.tasks()[0];
        assert_eq!(task.state, TaskState::Ongoing);
        assert_eq!(task.work_intervals.len(), 2);

        assert!(matches!(ctl.start_or_resume(), Err(TaskError::InvalidTransition { .. })));
    }

    #[test]
    fn test_commands_without_focus_fail() {
        let (_dir, mut ctl) = controller();
        assert_eq!(ctl.pause(), Err(TaskError::NoFocusedTask));
        assert_eq!(ctl.complete(), Err(TaskError::NoFocusedTask));
        assert_eq!(ctl.toggle_start_pause(), Err(TaskError::NoFocusedTask));
        assert_eq!(ctl.toggle_subtask(), Err(TaskError::NoFocusedTask));
    }

    #[test]
    fn test_tick_raises_each_alarm_level_once() {
        let (_dir, mut ctl) = controller();
        let id = ctl.new_task("Short", 1, None, None).unwrap();
        let rx = ctl.subscribe();

        ctl.tasks[0].elapsed_seconds = 59.5;
        for _ in 0..65 {
            ctl.tick();
        }

        let alarms: Vec<Event> = rx
            .try_iter()
            .filter(|e| matches!(e, Event::AlarmTriggered { .. }))
            .collect();
        assert_eq!(
            alarms,
            vec![
                Event::AlarmTriggered { task_id: id.clone(), level: 1 },
                Event::AlarmTriggered { task_id: id.clone(), level: 2 },
            ]
        );
        assert!(ctl.is_alarmed(&id));
        assert_eq!(ctl.store.load_active()[0].last_alarm_level, 2);
    }

    #[test]
    fn test_tick_event_follows_alarms() {
        let (_dir, mut ctl) = controller();
        let id = ctl.new_task("Short", 1, None, None).unwrap();
        ctl.tasks[0].elapsed_seconds = 59.5;
        let rx = ctl.subscribe();

        ctl.tick();

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![Event::AlarmTriggered { task_id: id, level: 1 }, Event::Tick]
        );
    }

    #[test]
    fn test_pause_clears_alarm_and_rearms() {
        let (_dir, mut ctl) = controller();
        let id = ctl.new_task("Short", 1, None, None).unwrap();
        ctl.tasks[0].elapsed_seconds = 59.5;
        ctl.tick();
        assert!(ctl.is_alarmed(&id));

        let rx = ctl.subscribe();
        ctl.pause().unwrap();
        assert!(!ctl.has_alarms());
        assert_eq!(ctl.tasks()[0].last_alarm_level, 0);
        assert!(rx.try_iter().any(|e| e == Event::AlarmsCleared));

        ctl.start_or_resume().unwrap();
        ctl.tasks[0].elapsed_seconds = 60.5;
        let rx = ctl.subscribe();
        ctl.tick();
        assert!(rx
            .try_iter()
            .any(|e| e == Event::AlarmTriggered { task_id: id.clone(), level: 1 }));
    }

    #[test]
    fn test_dismiss_all_alarms_keeps_tasks_running() {
        let (_dir, mut ctl) = controller();
        let id = ctl.new_task("Short", 1, None, None).unwrap();
        ctl.tasks[0].elapsed_seconds = 59.5;
        ctl.tick();

        ctl.dismiss_all_alarms();
        assert!(!ctl.is_alarmed(&id));
        assert_eq!(ctl.tasks()[0].state, TaskState::Ongoing);

        // Already-fired level does not come back
        ctl.tick();
        assert!(!ctl.has_alarms());
    }

    #[test]
    fn test_complete_moves_task_to_history() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("First", 10, None, None).unwrap();
        let second = ctl.new_task("Second", 10, Some(5), None).unwrap();
        ctl.new_task("Third", 10, None, None).unwrap();
        ctl.move_focus(1);
        let rx = ctl.subscribe();

        let within = ctl.complete().unwrap();

        assert!(within);
        assert_eq!(names(&ctl), vec!["First", "Third"]);
        assert_eq!(ctl.focused_task().unwrap().name, "Third");
        assert_eq!(history_lines(&ctl), 1);

        let history = ctl.store.load_history();
        assert_eq!(history[0].id, second);
        assert_eq!(history[0].state, TaskState::Completed);
        assert!(history[0].completed_at.is_some());

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(
            events[..2],
            [
                Event::TaskRemoved { task_id: second.clone(), position: 1 },
                Event::TaskCompleted {
                    task_id: second,
                    name: "Second".to_string(),
                    within_ambitious: true,
                },
            ]
        );
    }

    #[test]
    fn test_complete_last_task_clears_focus() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("Only", 10, None, None).unwrap();
        assert!(!ctl.complete().unwrap());
        assert!(ctl.tasks().is_empty());
        assert_eq!(ctl.focus(), None);
    }

    #[test]
    fn test_complete_at_end_moves_focus_up() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();
        ctl.move_focus(-1);
        assert_eq!(ctl.focus(), Some(1));

        ctl.complete().unwrap();
        assert_eq!(ctl.focus(), Some(0));
    }

    #[test]
    fn test_undo_restores_task_at_original_index() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("A", 10, None, None).unwrap();
        let b = ctl.new_task("B", 10, None, None).unwrap();
        ctl.new_task("C", 10, None, None).unwrap();
        ctl.move_focus(1);
        ctl.complete().unwrap();
        assert_eq!(ctl.undo_candidate(), Some("B"));

        let restored = ctl.undo_last_completion().unwrap();

        assert_eq!(restored, b);
        assert_eq!(names(&ctl), vec!["A", "B", "C"]);
        assert_eq!(ctl.focus(), Some(1));
        let task = &ctl.tasks()[1];
        assert_eq!(task.state, TaskState::Ongoing);
        assert_eq!(task.completed_at, None);
        assert!(task.has_open_interval());
        assert_eq!(history_lines(&ctl), 0);
        assert_eq!(ctl.store.load_active().len(), 3);
    }

    #[test]
    fn test_undo_index_is_clamped() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();
        ctl.new_task("C", 10, None, None).unwrap();
        ctl.move_focus(-1);
        ctl.complete().unwrap();

        ctl.tasks.truncate(1);
        ctl.undo_last_completion().unwrap();

        assert_eq!(names(&ctl), vec!["A", "C"]);
        assert_eq!(ctl.focus(), Some(1));
    }

    #[test]
    fn test_second_undo_fails_without_change() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("A", 10, None, None).unwrap();
        ctl.complete().unwrap();
        ctl.undo_last_completion().unwrap();

        assert_eq!(ctl.undo_last_completion(), Err(TaskError::NothingToUndo));
        assert_eq!(names(&ctl), vec!["A"]);
    }

    #[test]
    fn test_undo_refuses_when_history_tail_changed() {
        let (_dir, mut ctl) = controller();
        let a = ctl.new_task("A", 10, None, None).unwrap();
        ctl.complete().unwrap();

        let mut other = Task::new("Elsewhere", 5, None, None);
        other.resume_at(Local::now()).unwrap();
        other.complete_at(Local::now()).unwrap();
        ctl.store.append_history(&other).unwrap();

        assert_eq!(ctl.undo_last_completion(), Err(TaskError::HistoryMismatch(a)));
        assert!(ctl.tasks().is_empty());
        assert_eq!(history_lines(&ctl), 2);

        // The record can never match again, so it is gone
        assert_eq!(ctl.undo_candidate(), None);
        assert_eq!(ctl.undo_last_completion(), Err(TaskError::NothingToUndo));
    }

    #[test]
    fn test_complete_keeps_task_when_history_write_fails() {
        let dir = tempdir().unwrap();
        // A directory where the history file should be
        let store = TaskStore::new(
            dir.path().join(crate::config::ACTIVE_FILE_NAME),
            dir.path().to_path_buf(),
        );
        let mut ctl = TaskController::load(store, TimerEngine::new(1.0));
        let id = ctl.new_task("Precious", 10, None, None).unwrap();
        let rx = ctl.subscribe();

        assert!(matches!(ctl.complete(), Err(TaskError::Storage(_))));

        assert_eq!(names(&ctl), vec!["Precious"]);
        let task = &ctl.tasks()[0];
        assert_eq!(task.state, TaskState::Ongoing);
        assert_eq!(task.completed_at, None);
        assert!(task.has_open_interval());
        assert_eq!(ctl.focus(), Some(0));
        assert_eq!(ctl.undo_candidate(), None);
        assert_eq!(rx.try_iter().count(), 0);

        let on_disk = ctl.store.load_active();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[0].id, id);
    }

    #[test]
    fn test_undo_puts_subtask_back_inside_parent_group() {
        let (_dir, mut ctl) = controller();
        let a = ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("A.1", 10, None, Some(a.clone())).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();
        ctl.new_task("C", 10, None, None).unwrap();
        ctl.move_focus(1);
        ctl.complete().unwrap();
        assert_eq!(names(&ctl), vec!["A", "B", "C"]);

        // A moved down since the completion; index 1 is now above it
        ctl.tasks.swap(0, 1);
        ctl.undo_last_completion().unwrap();

        assert_eq!(names(&ctl), vec!["B", "A", "A.1", "C"]);
        assert_eq!(ctl.tasks()[2].parent_task_id, Some(a));
        assert_eq!(ctl.focus(), Some(2));
    }

    #[test]
    fn test_undo_does_not_split_a_subtask_group() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("X", 10, None, None).unwrap();
        let b = ctl.new_task("B", 10, None, None).unwrap();
        ctl.new_task("B.1", 10, None, Some(b)).unwrap();
        ctl.move_focus(1);
        ctl.complete().unwrap();

        ctl.tasks.remove(0);
        ctl.undo_last_completion().unwrap();

        assert_eq!(names(&ctl), vec!["B", "B.1", "X"]);
        assert_eq!(ctl.focused_task().unwrap().name, "X");
    }

    #[test]
    fn test_toggle_subtask_links_and_unlinks() {
        let (_dir, mut ctl) = controller();
        let a = ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();

        assert_eq!(ctl.toggle_subtask(), Err(TaskError::NoPrecedingTask));
        assert_eq!(ctl.tasks()[0].parent_task_id, None);

        ctl.move_focus(1);
        assert_eq!(ctl.toggle_subtask().unwrap(), Some(a.clone()));
        assert_eq!(ctl.tasks()[1].parent_task_id, Some(a));

        assert_eq!(ctl.toggle_subtask().unwrap(), None);
        assert_eq!(ctl.tasks()[1].parent_task_id, None);
    }

    #[test]
    fn test_unlinking_middle_subtask_keeps_siblings_grouped() {
        let (_dir, mut ctl) = controller();
        let a = ctl.new_task("A", 10, None, None).unwrap();
        let first = ctl.new_task("A.1", 10, None, Some(a.clone())).unwrap();
        ctl.new_task("A.2", 10, None, Some(a.clone())).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();
        ctl.move_focus(1);
        let rx = ctl.subscribe();

        assert_eq!(ctl.toggle_subtask().unwrap(), None);

        let order: Vec<(&str, bool)> = ctl
            .tasks()
            .iter()
            .map(|t| (t.name.as_str(), t.parent_task_id.as_ref() == Some(&a)))
            .collect();
        assert_eq!(
            order,
            vec![("A", false), ("A.2", true), ("A.1", false), ("B", false)]
        );
        assert_eq!(ctl.focused_task().unwrap().name, "A.1");

        let events: Vec<Event> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                Event::TaskRemoved { task_id: first.clone(), position: 1 },
                Event::TaskInserted { task_id: first, position: 2 },
                Event::FocusChanged(Some(2)),
            ]
        );
        assert_eq!(ctl.store.load_active()[1].name, "A.2");
    }

    #[test]
    fn test_toggle_subtask_below_a_subtask_joins_same_parent() {
        let (_dir, mut ctl) = controller();
        let a = ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("A.1", 10, None, Some(a.clone())).unwrap();
        let b = ctl.new_task("B", 10, None, None).unwrap();
        ctl.new_task("B.1", 10, None, Some(b)).unwrap();

        // Focus B and nest it: B and its own subtask both end up under A
        ctl.move_focus(2);
        assert_eq!(ctl.focused_task().unwrap().name, "B");
        assert_eq!(ctl.toggle_subtask().unwrap(), Some(a.clone()));

        for task in &ctl.tasks()[1..] {
            assert_eq!(task.parent_task_id.as_ref(), Some(&a), "{}", task.name);
        }
    }

    #[test]
    fn test_move_focus_wraps() {
        let (_dir, mut ctl) = controller();
        ctl.move_focus(1);
        assert_eq!(ctl.focus(), None);

        ctl.new_task("A", 10, None, None).unwrap();
        ctl.new_task("B", 10, None, None).unwrap();
        ctl.new_task("C", 10, None, None).unwrap();

        ctl.move_focus(-1);
        assert_eq!(ctl.focus(), Some(2));
        ctl.move_focus(1);
        assert_eq!(ctl.focus(), Some(0));
        ctl.move_focus(4);
        assert_eq!(ctl.focus(), Some(1));
    }

    #[test]
    fn test_sleep_pauses_running_and_wake_resumes_only_those() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("Running", 1, None, None).unwrap();
        ctl.new_task("Manual", 10, None, None).unwrap();
        ctl.move_focus(1);
        ctl.pause().unwrap();
        ctl.tasks[0].elapsed_seconds = 59.5;
        ctl.tick();
        assert!(ctl.has_alarms());

        let slept_at = Local::now();
        ctl.on_system_sleep_at(slept_at);

        assert!(ctl.tasks().iter().all(|t| t.state == TaskState::Paused));
        assert!(!ctl.has_alarms());
        let closed = ctl.tasks()[0].work_intervals.last().unwrap();
        assert_eq!(closed.end, Some(slept_at));
        assert_eq!(ctl.tasks()[0].last_alarm_level, 0);

        ctl.on_system_wake_at(slept_at + chrono::Duration::minutes(10));

        assert_eq!(ctl.tasks()[0].state, TaskState::Ongoing);
        assert_eq!(ctl.tasks()[1].state, TaskState::Paused);

        // A second wake has nothing left to resume
        ctl.on_system_wake();
        assert_eq!(ctl.tasks()[1].state, TaskState::Paused);
    }

    #[test]
    fn test_wake_skips_tasks_completed_while_asleep() {
        let (_dir, mut ctl) = controller();
        ctl.new_task("Running", 10, None, None).unwrap();
        ctl.on_system_sleep();
        ctl.complete().unwrap();

        ctl.on_system_wake();
        assert!(ctl.tasks().is_empty());
    }

    #[test]
    fn test_load_restores_open_interval_for_ongoing() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(crate::config::ACTIVE_FILE_NAME),
            r#"[{"id": "legacy", "name": "Old", "estimated_seconds": 600,
                 "state": "ongoing", "elapsed_seconds": 42.0,
                 "created_at": "2024-03-01T09:00:00"}]"#,
        )
        .unwrap();

        let ctl = TaskController::load(TaskStore::in_dir(dir.path()), TimerEngine::default());

        assert_eq!(ctl.focus(), Some(0));
        let task = &ctl.tasks()[0];
        assert!(task.has_open_interval());
        // Legacy scalar carried into a closed interval
        assert_eq!(task.work_intervals.len(), 2);
        assert!((task.compute_elapsed(Local::now()) - 42.0).abs() < 1.0);
    }

    #[test]
    fn test_storage_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let mut ctl = TaskController::load(TaskStore::in_dir(&blocker), TimerEngine::default());

        ctl.new_task("Still works", 10, None, None).unwrap();

        assert_eq!(ctl.tasks().len(), 1);
        assert!(matches!(ctl.take_storage_error(), Some(TaskError::Storage(_))));
        assert_eq!(ctl.take_storage_error(), None);
        assert!(ctl.save().is_err());
    }
}
