use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

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

/// Render one `Label: value` row of a modal form. Empty fields show the
/// placeholder in gray; the focused field is highlighted.
pub(crate) fn field_line(
    label: &str,
    value: &str,
    placeholder: &str,
    is_active: bool,
) -> Line<'static> {
    let display = if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(display, style),
    ])
}

/// Replace every character with a bullet for password entry.
pub(crate) fn mask(value: &str) -> String {
    "•".repeat(value.chars().count())
}

/// Cut `value` to `width` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut cut: String = value.chars().take(width - 1).collect();
    cut.push('…');
    cut
}

/// Number of terminal cells a `Label: ` prefix plus `len` characters take.
pub(crate) fn cursor_column(label: &str, len: usize) -> u16 {
    (label.chars().count() + 2 + len) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_one_bullet_per_char() {
        assert_eq!(mask("secret"), "••••••");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("Earthsea", 20), "Earthsea");
        assert_eq!(truncate("Earthsea", 5), "Eart…");
        assert_eq!(truncate("Earthsea", 0), "");
    }

    #[test]
    fn cursor_sits_after_value() {
        assert_eq!(cursor_column("Title", 4), 11);
    }
}
