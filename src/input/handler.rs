use crate::app::AppState;
use crate::domain::UiMode;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Handle keyboard input events; returns true when the app should quit
pub fn handle_key(app: &mut AppState, key: KeyEvent) -> Result<bool> {
    match app.ui_mode {
        UiMode::Normal => handle_normal_mode(app, key),
        UiMode::AddingTask | UiMode::AddingSubtask => handle_input_form_mode(app, key),
    }
}

/// Handle keys in normal mode
fn handle_normal_mode(app: &mut AppState, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Ok(true),
        KeyCode::Char('q') => Ok(true),

        // Navigation
        KeyCode::Up | KeyCode::Char('k') => {
            app.move_selection_up();
            Ok(false)
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.move_selection_down();
            Ok(false)
        }

        // Lifecycle
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.toggle_start_pause();
            Ok(false)
        }
        KeyCode::Char('d') => {
            app.complete_selected();
            Ok(false)
        }
        KeyCode::Char('u') => {
            app.undo();
            Ok(false)
        }
        KeyCode::Tab | KeyCode::Char('t') => {
            app.toggle_subtask();
            Ok(false)
        }

        // Creation
        KeyCode::Char('a') => {
            app.start_add_task();
            Ok(false)
        }
        KeyCode::Char('A') => {
            app.start_add_subtask();
            Ok(false)
        }

        // Quiet alarms without touching the tasks
        KeyCode::Char('x') | KeyCode::Esc => {
            app.dismiss_alarms();
            Ok(false)
        }

        _ => Ok(false),
    }
}

/// Handle keys while the add-task form is open
fn handle_input_form_mode(app: &mut AppState, key: KeyEvent) -> Result<bool> {
    match key.code {
        // Submit form
        KeyCode::Enter => {
            app.submit_input_form();
            Ok(false)
        }

        // Cancel form
        KeyCode::Esc => {
            app.cancel_input_form();
            Ok(false)
        }

        // Cycle name -> minutes -> ambitious
        KeyCode::Tab => {
            app.input_form_toggle_field();
            Ok(false)
        }

        KeyCode::Backspace => {
            app.input_form_backspace();
            Ok(false)
        }

        KeyCode::Char(c) => {
            app.input_form_add_char(c);
            Ok(false)
        }

        _ => Ok(false),
    }
}
