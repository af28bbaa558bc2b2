use crate::app::{AppState, InputFormState};
use crate::config::{MAX_TASK_MINUTES, MIN_TASK_MINUTES};
use crate::ui::{
    layout::create_modal_area,
    styles::{error_style, modal_bg_style, modal_title_style},
};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Render the input form for adding tasks/subtasks
pub fn render_input_form(f: &mut Frame, app: &AppState, area: Rect) {
    if let Some(form) = &app.input_form {
        let modal_area = create_modal_area(area);

        // Clear the area behind the form
        f.render_widget(Clear, modal_area);

        let title_text = match &form.parent {
            Some((_, parent_name)) => format!(" Add Subtask of '{}' ", parent_name),
            None => " Add Task ".to_string(),
        };

        let mut lines = vec![Line::raw("")];
        lines.extend(field_lines(form, 0, "Name:", &form.name));
        lines.extend(field_lines(
            form,
            1,
            &format!("Estimate ({}-{} min):", MIN_TASK_MINUTES, MAX_TASK_MINUTES),
            &form.minutes,
        ));
        lines.extend(field_lines(form, 2, "Ambitious (min, optional):", &form.ambitious));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(error.clone(), error_style())));
            lines.push(Line::raw(""));
        }

        // Instructions
        lines.push(Line::raw("Tab to switch fields  ·  Enter to start  ·  Esc to cancel"));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(title_text, modal_title_style()))
                    .style(modal_bg_style()),
            )
            .wrap(Wrap { trim: false });

        f.render_widget(paragraph, modal_area);
    }
}

fn field_lines<'a>(form: &InputFormState, field: usize, label: &str, value: &'a str) -> Vec<Line<'a>> {
    let editing = form.editing_field == field;
    let label = if editing {
        format!("{} (editing)", label)
    } else {
        label.to_string()
    };

    vec![
        Line::raw(label),
        Line::from(vec![
            Span::raw("> "),
            Span::styled(value, modal_title_style()),
            if editing {
                Span::styled("█", modal_title_style()) // Cursor
            } else {
                Span::raw("")
            },
        ]),
        Line::raw(""),
    ]
}
