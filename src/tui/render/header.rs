use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::model::{FilterState, User};
use crate::tui::app::App;
use crate::util::text::display_width;

/// Render the one-line header: title, active filter, request activity
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = area.width as usize;
    let session = &app.session;

    let mut spans = vec![Span::styled(
        " taskdeck",
        Style::default()
            .fg(app.theme.highlight)
            .bg(bg)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(summary) = filter_summary(session.filter(), session.users()) {
        spans.push(Span::styled(
            format!("  filter: {}", summary),
            Style::default().fg(app.theme.yellow).bg(bg),
        ));
    }

    let pending = session.pending_requests();
    if pending > 0 {
        let badge = format!("\u{27F3} {} ", pending);
        let used: usize = spans.iter().map(|s| display_width(&s.content)).sum();
        let badge_width = display_width(&badge);
        if used + badge_width < width {
            spans.push(Span::styled(
                " ".repeat(width - used - badge_width),
                Style::default().bg(bg),
            ));
            spans.push(Span::styled(badge, Style::default().fg(app.theme.dim).bg(bg)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

/// Short description of an active filter, e.g. `"docs" status=pending !high`
pub fn filter_summary(filter: &FilterState, users: &[User]) -> Option<String> {
    if !filter.is_active() {
        return None;
    }
    let mut parts = Vec::new();
    if let Some(q) = filter.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        parts.push(format!("\"{}\"", q));
    }
    if !filter.statuses.is_empty() {
        let keys: Vec<&str> = filter.statuses.iter().map(String::as_str).collect();
        parts.push(format!("status={}", keys.join("|")));
    }
    if let Some(p) = filter.priority {
        parts.push(format!("!{}", p));
    }
    if let Some(id) = filter.assignee {
        let name = users
            .iter()
            .find(|u| u.id == id)
            .map_or_else(|| format!("#{}", id), |u| u.name.clone());
        parts.push(format!("@{}", name));
    }
    if !filter.due.is_open() {
        let date = |d: Option<chrono::NaiveDate>| {
            d.map_or_else(|| "…".to_string(), |d| d.format("%Y-%m-%d").to_string())
        };
        parts.push(format!("due {}..{}", date(filter.due.from), date(filter.due.to)));
    }
    Some(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_lists_every_part() {
        let mut filter = FilterState {
            search: Some(" docs ".into()),
            priority: Some(Priority::High),
            assignee: Some(1),
            ..Default::default()
        };
        filter.toggle_status("pending");
        filter.due.to = NaiveDate::from_ymd_opt(2025, 6, 30);
        let users = vec![User {
            id: 1,
            name: "Ada".into(),
            avatar_url: None,
        }];
        assert_eq!(
            filter_summary(&filter, &users).as_deref(),
            Some("\"docs\" status=pending !high @Ada due …..2025-06-30")
        );
    }

    #[test]
    fn inactive_filter_has_no_summary() {
        assert_eq!(filter_summary(&FilterState::default(), &[]), None);
    }
}
