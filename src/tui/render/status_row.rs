use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::session::Level;
use crate::tui::app::App;
use crate::util::text::{display_width, truncate_to_width};

const NAVIGATE_HINT: &str = "a add  e edit  x done  ? help  q quit";
const EDIT_HINT: &str = "Enter save  Esc cancel";

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;
    let session = &app.session;

    let mut spans = Vec::new();
    if let Some(notice) = session.notices().current() {
        let marker = match notice.level {
            Level::Info => "",
            Level::Warning => "! ",
            Level::Error => "\u{2716} ",
        };
        let text = format!(" {}{}", marker, notice.message);
        spans.push(Span::styled(
            truncate_to_width(&text, width),
            Style::default().fg(app.theme.notice_color(notice.level)).bg(bg),
        ));
    } else if session.editing_task().is_some() {
        spans.push(Span::styled(
            " -- EDIT --",
            Style::default().fg(app.theme.highlight).bg(bg),
        ));
    }

    let unsaved = session.unconfirmed();
    let hint = if session.editing_task().is_some() {
        EDIT_HINT.to_string()
    } else if unsaved > 0 {
        format!("{} unsaved  {}", unsaved, NAVIGATE_HINT)
    } else {
        NAVIGATE_HINT.to_string()
    };
    let content_width: usize = spans.iter().map(|s| display_width(&s.content)).sum();
    let hint_width = display_width(&hint) + 1;
    if content_width + hint_width < width {
        let padding = width - content_width - hint_width;
        spans.push(Span::styled(" ".repeat(padding), Style::default().bg(bg)));
        spans.push(Span::styled(
            format!("{} ", hint),
            Style::default().fg(app.theme.dim).bg(bg),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::tui::render::test_helpers::{TERM_W, demo_app, render_to_string};

    #[test]
    fn shows_hints_when_idle() {
        let (app, _remote) = demo_app();
        let text = render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, &app, area)
        });
        assert!(text.ends_with(NAVIGATE_HINT), "{}", text);
    }

    #[test]
    fn notice_takes_the_left_side() {
        let (mut app, _remote) = demo_app();
        app.session
            .notices_mut()
            .error("Could not save task", Instant::now());
        let text = render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, &app, area)
        });
        assert!(text.starts_with(" \u{2716} Could not save task"), "{}", text);
    }

    #[test]
    fn edit_mode_swaps_hints() {
        let (mut app, _remote) = demo_app();
        let todo = app.session.board().section_ids()[0];
        app.session.add_task(todo).unwrap();
        let text = render_to_string(TERM_W, 1, |frame, area| {
            render_status_row(frame, &app, area)
        });
        assert!(text.starts_with(" -- EDIT --"));
        assert!(text.ends_with(EDIT_HINT));
    }
}
