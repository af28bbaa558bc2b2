use crate::app::AppState;
use crate::domain::{compute_totals, format_clock, task_rows, TaskRow, TaskState};
use crate::ui::styles::{
    alarm_style, ambitious_style, border_style, default_style, idle_style, over_estimate_style,
    paused_style, running_style, selected_style, title_style, tree_style,
};
use chrono::Local;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the active task list
pub fn render_list_pane(f: &mut Frame, app: &AppState, area: Rect) {
    let rows = task_rows(app.controller.tasks(), Local::now());
    let focus = app.controller.focus();

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let alarmed = app.controller.is_alarmed(&row.id);
            let style = if Some(row.index) == focus {
                selected_style()
            } else {
                default_style()
            };
            ListItem::new(create_task_line(row, alarmed)).style(style)
        })
        .collect();

    let title = list_title(&rows);

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style())
            .title(Span::styled(title, title_style())),
    );

    // Keep the focused row scrolled into view
    let mut state = ListState::default().with_selected(focus);
    f.render_stateful_widget(list, area, &mut state);
}

/// Create a single line for a task
/// Format: └ Write proposal  12:34 / 30:00  [RUNNING] ⏰
fn create_task_line(row: &TaskRow, alarmed: bool) -> Line<'static> {
    let mut spans = Vec::new();

    if row.is_subtask {
        spans.push(Span::styled("   └ ".to_string(), tree_style()));
    } else {
        spans.push(Span::raw(" ".to_string()));
    }

    spans.push(Span::raw(row.name.clone()));
    spans.push(Span::raw("  ".to_string()));

    spans.push(Span::styled(row.time_label(), time_style(row)));

    if let Some(ambitious) = row.ambitious_seconds {
        spans.push(Span::styled(
            format!(" 🎯 {}", format_clock(ambitious as f64)),
            tree_style(),
        ));
    }

    let badge_style = match row.state {
        TaskState::Ongoing => running_style(),
        TaskState::Paused => paused_style(),
        _ => idle_style(),
    };
    spans.push(Span::raw("  ".to_string()));
    spans.push(Span::styled(row.state.badge().to_string(), badge_style));

    if alarmed {
        spans.push(Span::raw(" ".to_string()));
        spans.push(Span::styled(" ⏰ ".to_string(), alarm_style()));
    }

    Line::from(spans)
}

fn time_style(row: &TaskRow) -> Style {
    if row.is_over_estimate() {
        over_estimate_style()
    } else if row.is_within_ambitious() {
        ambitious_style()
    } else {
        default_style()
    }
}

/// Pane title with the task count and summed elapsed / estimate
fn list_title(rows: &[TaskRow]) -> String {
    let (elapsed, estimate) = compute_totals(rows);
    format!(
        " etime ({}) | {} / {} ",
        rows.len(),
        format_clock(elapsed),
        format_clock(estimate as f64)
    )
}
