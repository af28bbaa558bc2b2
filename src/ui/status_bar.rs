use crate::app::AppState;
use crate::ui::styles::{alarm_style, hint_style};
use ratatui::{layout::Rect, text::Span, widgets::Paragraph, Frame};

/// Render the one-line status bar under the list
pub fn render_status_bar(f: &mut Frame, app: &AppState, area: Rect) {
    let style = if app.controller.has_alarms() {
        alarm_style()
    } else {
        hint_style()
    };

    let text = match (&app.status_message, app.controller.undo_candidate()) {
        (Some(message), _) => format!(" {}", message),
        (None, Some(name)) => format!(" u to restore '{}'", name),
        (None, None) => String::new(),
    };

    f.render_widget(Paragraph::new(Span::styled(text, style)), area);
}
