use crate::config::Settings;
use crate::controller::TaskController;
use crate::domain::{TaskId, UiMode};
use crate::error::TaskResult;
use crate::events::Event;
use crate::notifications;
use chrono::{DateTime, Local};
use std::sync::mpsc::Receiver;

/// Input form state for adding tasks
#[derive(Debug, Clone)]
pub struct InputFormState {
    pub name: String,
    pub minutes: String,
    pub ambitious: String,
    /// Parent id and name when adding a subtask
    pub parent: Option<(TaskId, String)>,
    pub editing_field: usize, // 0 = name, 1 = minutes, 2 = ambitious
    pub error: Option<String>,
}

impl InputFormState {
    fn new(default_minutes: u32, parent: Option<(TaskId, String)>) -> Self {
        Self {
            name: String::new(),
            minutes: default_minutes.to_string(),
            ambitious: String::new(),
            parent,
            editing_field: 0,
            error: None,
        }
    }
}

/// Terminal front end state wrapped around the controller
pub struct AppState {
    pub controller: TaskController,
    pub ui_mode: UiMode,
    pub input_form: Option<InputFormState>,
    pub status_message: Option<String>,
    pub settings: Settings,
    events: Receiver<Event>,
    last_wall_tick: DateTime<Local>,
}

impl AppState {
    pub fn new(mut controller: TaskController, settings: Settings) -> Self {
        let events = controller.subscribe();
        Self {
            controller,
            ui_mode: UiMode::Normal,
            input_form: None,
            status_message: None,
            settings,
            events,
            last_wall_tick: Local::now(),
        }
    }

    pub fn move_selection_up(&mut self) {
        self.controller.move_focus(-1);
    }

    pub fn move_selection_down(&mut self) {
        self.controller.move_focus(1);
    }

    pub fn toggle_start_pause(&mut self) {
        let result = self.controller.toggle_start_pause();
        self.report(result);
    }

    pub fn complete_selected(&mut self) {
        let result = self.controller.complete();
        self.report(result);
    }

    pub fn undo(&mut self) {
        let result = self.controller.undo_last_completion();
        if self.report(result).is_some() {
            self.status_message = Some("↶ Restored last completed task".to_string());
        }
    }

    pub fn toggle_subtask(&mut self) {
        let result = self.controller.toggle_subtask();
        self.report(result);
    }

    pub fn dismiss_alarms(&mut self) {
        self.controller.dismiss_all_alarms();
        self.status_message = None;
    }

    /// Start adding a new task (opens input form)
    pub fn start_add_task(&mut self) {
        self.input_form = Some(InputFormState::new(self.settings.default_minutes(), None));
        self.ui_mode = UiMode::AddingTask;
    }

    /// Start adding a subtask of the focused task (opens input form)
    pub fn start_add_subtask(&mut self) {
        let Some(parent) = self.controller.focused_task() else {
            self.status_message = Some("No task focused".to_string());
            return;
        };
        let parent = Some((parent.id.clone(), parent.name.clone()));

        self.input_form = Some(InputFormState::new(self.settings.default_minutes(), parent));
        self.ui_mode = UiMode::AddingSubtask;
    }

    /// Toggle between editing fields in input form (name -> minutes -> ambitious)
    pub fn input_form_toggle_field(&mut self) {
        if let Some(form) = &mut self.input_form {
            form.editing_field = (form.editing_field + 1) % 3;
        }
    }

    /// Add character to input form (current field); time fields take digits only
    pub fn input_form_add_char(&mut self, c: char) {
        if let Some(form) = &mut self.input_form {
            match form.editing_field {
                0 => form.name.push(c),
                1 if c.is_ascii_digit() => form.minutes.push(c),
                2 if c.is_ascii_digit() => form.ambitious.push(c),
                _ => {}
            }
        }
    }

    /// Backspace in input form (current field)
    pub fn input_form_backspace(&mut self) {
        if let Some(form) = &mut self.input_form {
            match form.editing_field {
                0 => { form.name.pop(); },
                1 => { form.minutes.pop(); },
                2 => { form.ambitious.pop(); },
                _ => {}
            }
        }
    }

    /// Submit input form and create the task.
    ///
    /// Rejected input keeps the form open with the reason shown.
    pub fn submit_input_form(&mut self) {
        let Some(form) = self.input_form.as_mut() else {
            return;
        };

        let minutes = if form.minutes.trim().is_empty() {
            self.settings.default_minutes()
        } else {
            match form.minutes.trim().parse::<u32>() {
                Ok(minutes) => minutes,
                Err(_) => {
                    form.error = Some("Estimate must be a number of minutes".to_string());
                    return;
                }
            }
        };

        let ambitious = match form.ambitious.trim() {
            "" => None,
            raw => match raw.parse::<u32>() {
                Ok(ambitious) => Some(ambitious),
                Err(_) => {
                    form.error = Some("Ambitious time must be a number of minutes".to_string());
                    return;
                }
            },
        };

        let name = form.name.clone();
        let parent = form.parent.as_ref().map(|(id, _)| id.clone());

        match self.controller.new_task(&name, minutes, ambitious, parent) {
            Ok(_) => {
                self.input_form = None;
                self.ui_mode = UiMode::Normal;
            }
            Err(e) if e.is_validation() => {
                if let Some(form) = self.input_form.as_mut() {
                    form.error = Some(e.to_string());
                }
            }
            Err(e) => {
                self.cancel_input_form();
                self.report::<()>(Err(e));
            }
        }
    }

    /// Cancel input form
    pub fn cancel_input_form(&mut self) {
        self.input_form = None;
        self.ui_mode = UiMode::Normal;
    }

    pub fn tick(&mut self) {
        self.tick_at(Local::now());
    }

    /// One timer tick at wall-clock `now`, after handling any sleep gap
    pub fn tick_at(&mut self, now: DateTime<Local>) {
        self.detect_sleep(now);
        self.controller.tick();
    }

    /// Treat a wall-clock gap longer than the configured threshold as a
    /// system sleep that started at the previous tick
    pub fn detect_sleep(&mut self, now: DateTime<Local>) -> bool {
        let last = std::mem::replace(&mut self.last_wall_tick, now);
        let gap = now - last;
        if gap <= self.settings.sleep_gap() {
            return false;
        }

        tracing::info!("Detected {}s wall-clock gap, treating as sleep", gap.num_seconds());
        self.controller.on_system_sleep_at(last);
        self.controller.on_system_wake_at(now);
        true
    }

    /// Drain controller events into status messages and notifications.
    /// Returns how many events were handled.
    pub fn process_events(&mut self) -> usize {
        let events: Vec<Event> = self.events.try_iter().collect();

        for event in &events {
            match event {
                Event::AlarmTriggered { task_id, level } => {
                    let name = self
                        .controller
                        .task(task_id)
                        .map(|t| t.name.clone())
                        .unwrap_or_default();
                    self.status_message = Some(notifications::alarm_message(&name, *level));
                    if self.settings.notifications {
                        notifications::notify_alarm(&name, *level);
                    }
                }
                Event::TaskCompleted { name, within_ambitious, .. } => {
                    self.status_message = Some(notifications::completion_message(name, *within_ambitious));
                    if self.settings.notifications {
                        notifications::notify_completed(name, *within_ambitious);
                    }
                }
                _ => {}
            }
        }

        if let Some(err) = self.controller.take_storage_error() {
            self.status_message = Some(err.to_string());
        }

        events.len()
    }

    /// Show a failed command on the status line
    fn report<T>(&mut self, result: TaskResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Command rejected: {}", e);
                self.status_message = Some(e.to_string());
                None
            }
        }
    }
}
