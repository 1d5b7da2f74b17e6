use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::models::Visibility;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Footer line of `[key] action` pairs.
pub(crate) fn key_hints(hints: &[(&str, &str)]) -> Line<'static> {
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let mut spans = Vec::with_capacity(hints.len() * 2);
    for (index, (key, action)) in hints.iter().enumerate() {
        let separator = if index + 1 == hints.len() { "" } else { "   " };
        spans.push(Span::styled(format!("[{key}]"), key_style));
        spans.push(Span::raw(format!(" {action}{separator}")));
    }
    Line::from(spans)
}

pub(crate) fn visibility_style(visibility: Visibility) -> Style {
    match visibility {
        Visibility::Private => Style::default().fg(Color::DarkGray),
        Visibility::UrlOnly | Visibility::SpecificUsers => Style::default().fg(Color::Magenta),
        Visibility::Public => Style::default().fg(Color::Green),
    }
}

/// Anchor as a whole percentage for display.
pub(crate) fn anchor_percent(anchor: f64) -> String {
    format!("{:.0}%", anchor.clamp(0.0, 1.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Context};

    use super::*;

    #[test]
    fn surface_error_reports_the_root_cause() {
        let err = Err::<(), _>(anyhow!("title too long"))
            .context("failed to save song")
            .unwrap_err();
        assert_eq!(surface_error(&err), "title too long");
    }

    #[test]
    fn key_hints_alternate_keys_and_actions() {
        let line = key_hints(&[("s", "Save"), ("q", "Quit")]);
        let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
        assert_eq!(text, "[s] Save   [q] Quit");
    }

    #[test]
    fn anchors_render_as_percentages() {
        assert_eq!(anchor_percent(0.256), "26%");
        assert_eq!(anchor_percent(3.0), "100%");
    }
}
