use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use super::centered_rect;
use crate::tui::app::App;

type Bindings = &'static [(&'static str, &'static str)];

const SECTIONS: &[(&str, Bindings)] = &[
    (
        " Navigation",
        &[
            (" \u{2191}\u{2193}/jk", "Move between tasks"),
            (" PgUp/PgDn", "Scroll a page"),
            (" g/G", "Jump to top/bottom"),
            (" [ ]", "Previous/next section"),
            (" Tab/z", "Collapse/expand section"),
        ],
    ),
    (
        " Tasks",
        &[
            (" a", "Add task to section"),
            (" e/Enter", "Edit name"),
            (" x/Space", "Toggle done"),
            (" s", "Set status"),
            (" p", "Cycle priority"),
            (" d", "Set due date"),
            (" u", "Assignees"),
            (" J/K", "Move down/up"),
            (" H/L", "Move to previous/next section"),
            (" D/Del", "Delete task"),
        ],
    ),
    (
        " Board",
        &[
            (" f / F", "Filter / clear filter"),
            (" S", "New section"),
            (" R", "Rename section"),
            (" < >", "Move section up/down"),
            (" X", "Delete section"),
            (" q", "Quit"),
        ],
    ),
    (
        " Editing",
        &[
            (" Enter/Tab", "Save now"),
            (" Esc", "Discard changes"),
            (" Ctrl-W", "Delete word"),
        ],
    ),
];

/// Render the help overlay (toggled with ?)
pub fn render_help_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let overlay_area = centered_rect(60, 90, area);
    frame.render_widget(Clear, overlay_area);

    let bg = app.theme.background;
    let dim = app.theme.dim;
    let key_style = Style::default()
        .fg(app.theme.highlight)
        .bg(bg)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(app.theme.text).bg(bg);
    let header_style = Style::default()
        .fg(app.theme.text_bright)
        .bg(bg)
        .add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(" Key Bindings", header_style)));
    lines.push(Line::from(""));

    for (i, (title, bindings)) in SECTIONS.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(*title, header_style)));
        for (key, desc) in *bindings {
            add_binding(&mut lines, key, desc, key_style, desc_style);
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(dim).bg(bg))
        .style(Style::default().bg(bg));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(bg));

    frame.render_widget(paragraph, overlay_area);
}

fn add_binding<'a>(
    lines: &mut Vec<Line<'a>>,
    key: &'a str,
    desc: &'a str,
    key_style: Style,
    desc_style: Style,
) {
    let key_width = 14;
    let padded_key = format!("{:<width$}", key, width = key_width);
    lines.push(Line::from(vec![
        Span::styled(padded_key, key_style),
        Span::styled(desc, desc_style),
    ]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Modal;
    use crate::tui::render::test_helpers::{demo_app, render_app};

    #[test]
    fn help_lists_bindings() {
        let (mut app, _remote) = demo_app();
        app.session.open_modal(Modal::Help);
        let text = render_app(&mut app, 100, 50);
        assert!(text.contains("Key Bindings"));
        assert!(text.contains("Add task to section"));
        assert!(text.contains("Delete section"));
    }
}
