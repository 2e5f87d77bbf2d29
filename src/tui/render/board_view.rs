use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line as TextLine, Span};
use ratatui::widgets::Paragraph;

use crate::model::{Section, Task, initials};
use crate::paging::{Line, SectionLayout, Window};
use crate::tui::app::App;
use crate::util::text::{column_of, display_width, fit_to_width};

/// Width of the columns right of the task name
const META_WIDTH: usize = 40;
/// Below this width only the name and status are shown
const NARROW: usize = 64;
/// Cursor bar, marker and checkbox in front of the name
const PREFIX_WIDTH: usize = 8;

/// Render the sections and tasks of the shared scroll container
pub fn render_board(frame: &mut Frame, app: &mut App, area: Rect) {
    app.session.set_viewport(area.height as usize);
    app.edit_anchor = None;
    let bg = app.theme.background;

    let lines = app.session.lines();
    if lines.is_empty() {
        let msg = if app.session.is_busy() {
            " Loading\u{2026}"
        } else {
            " No sections"
        };
        let empty = Paragraph::new(msg).style(Style::default().fg(app.theme.dim).bg(bg));
        frame.render_widget(empty, area);
        return;
    }

    let width = area.width as usize;
    let height = area.height as usize;
    let start = app.session.scroll_offset().min(lines.len());
    let end = lines.len().min(start + height);
    let focus_header = match app.session.selected() {
        Some(_) => None,
        None => app.current_section(),
    };

    let mut out: Vec<TextLine> = Vec::with_capacity(height);
    for (row, line) in lines[start..end].iter().enumerate() {
        let rendered = match *line {
            Line::Header(id) => app
                .session
                .board()
                .section(id)
                .map(|s| header_line(app, s, focus_header == Some(id), width)),
            Line::Task(id) => {
                let built = app
                    .session
                    .board()
                    .task(id)
                    .map(|t| task_line(app, t, width));
                built.map(|(line, cursor_col)| {
                    if let Some(col) = cursor_col {
                        app.edit_anchor = Some((area.x + col as u16, area.y + row as u16));
                    }
                    line
                })
            }
            Line::More(id) => app
                .session
                .board()
                .section(id)
                .map(|s| more_line(app, s)),
        };
        out.push(rendered.unwrap_or_default());
    }

    let paragraph = Paragraph::new(out).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}

fn header_line<'a>(app: &App, section: &Section, focused: bool, width: usize) -> TextLine<'a> {
    let theme = &app.theme;
    let bg = if focused { theme.selection_bg } else { theme.background };
    let arrow = if section.collapsed { "\u{25B8}" } else { "\u{25BE}" };
    let count = section.tasks.len();
    let more = if section.page.has_more() { "+" } else { "" };

    let mut spans = vec![
        Span::styled(
            if focused { "\u{258E}" } else { " " },
            Style::default().fg(theme.selection_border).bg(bg),
        ),
        Span::styled(
            format!("{} {}", arrow, section.name),
            Style::default()
                .fg(theme.text_bright)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}{}", count, more),
            Style::default().fg(theme.dim).bg(bg),
        ),
    ];
    if !section.collapsed
        && SectionLayout::for_len(count, app.session.config().list.virtualize_threshold)
            == SectionLayout::Windowed
    {
        let rows = app.session.config().list.window_rows;
        let range = app
            .session
            .window(section.id)
            .copied()
            .unwrap_or_else(|| Window::new(rows))
            .visible_range(count);
        spans.push(Span::styled(
            format!("  [{}-{}]", range.start + 1, range.end),
            Style::default().fg(theme.dim).bg(bg),
        ));
    }
    if section.loading {
        spans.push(Span::styled(
            "  \u{2026}",
            Style::default().fg(theme.cyan).bg(bg),
        ));
    }
    pad_line(spans, width, bg)
}

/// A task row and, when its name is being edited, the cursor column
fn task_line<'a>(app: &App, task: &Task, width: usize) -> (TextLine<'a>, Option<usize>) {
    let theme = &app.theme;
    let session = &app.session;
    let selected = session.selected() == Some(task.id);
    let bg = if selected { theme.selection_bg } else { theme.background };
    let base = Style::default().bg(bg);

    let marker = if task.saving || session.is_saving(task.id) {
        Span::styled("\u{27F3}", base.fg(theme.cyan))
    } else if task.initial {
        Span::styled("+", base.fg(theme.green))
    } else {
        Span::styled(" ", base)
    };
    let check = if task.completed { "[x]" } else { "[ ]" };

    let mut spans = vec![
        Span::styled(
            if selected { "\u{258E}" } else { " " },
            base.fg(theme.selection_border),
        ),
        Span::styled("  ", base),
        marker,
        Span::styled(format!("{} ", check), base.fg(theme.dim)),
    ];

    let show_meta = width >= NARROW;
    let name_width = if show_meta {
        width.saturating_sub(PREFIX_WIDTH + META_WIDTH)
    } else {
        width.saturating_sub(PREFIX_WIDTH + 14)
    };

    let editing = session.rows().get(task.id).filter(|r| r.name.is_active());
    let mut cursor_col = None;
    let name_style = if task.completed {
        base.fg(theme.dim).add_modifier(Modifier::CROSSED_OUT)
    } else if selected {
        base.fg(theme.text_bright)
    } else {
        base.fg(theme.text)
    };
    match editing {
        Some(row) => {
            let buffer = row.name.buffer();
            let col = column_of(buffer, row.name.cursor()).min(name_width.saturating_sub(1));
            cursor_col = Some(PREFIX_WIDTH + col);
            spans.push(Span::styled(
                fit_to_width(buffer, name_width),
                base.fg(theme.text_bright).add_modifier(Modifier::UNDERLINED),
            ));
        }
        None if task.name.is_empty() => {
            spans.push(Span::styled(
                fit_to_width("untitled", name_width),
                base.fg(theme.dim).add_modifier(Modifier::ITALIC),
            ));
        }
        None => spans.push(Span::styled(fit_to_width(&task.name, name_width), name_style)),
    }

    let statuses = &session.config().statuses;
    let label = statuses
        .get(&task.status)
        .map_or(task.status.as_str(), |s| s.label.as_str());
    spans.push(Span::styled(
        format!(" {}", fit_to_width(label, 12)),
        base.fg(theme.status_color(&task.status)),
    ));
    if show_meta {
        spans.push(Span::styled(
            format!(" {}", fit_to_width(task.priority.as_str(), 6)),
            base.fg(theme.priority_color(task.priority)),
        ));
        let due = task
            .due
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        spans.push(Span::styled(format!(" {}", fit_to_width(&due, 10)), base.fg(theme.purple)));
        spans.push(Span::styled(
            format!(" {}", fit_to_width(&assignee_initials(app, task), 8)),
            base.fg(theme.blue),
        ));
    }
    (pad_line(spans, width, bg), cursor_col)
}

fn more_line<'a>(app: &App, section: &Section) -> TextLine<'a> {
    let text = if section.loading {
        "loading\u{2026}".to_string()
    } else {
        format!(
            "\u{22EF} more (page {}/{})",
            section.page.current, section.page.total
        )
    };
    TextLine::from(Span::styled(
        format!("      {}", text),
        Style::default().fg(app.theme.dim).bg(app.theme.background),
    ))
}

fn assignee_initials(app: &App, task: &Task) -> String {
    task.assignees
        .iter()
        .map(|id| {
            app.session
                .user(*id)
                .map_or_else(|| format!("#{}", id), |u| initials(&u.name))
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn pad_line(mut spans: Vec<Span<'_>>, width: usize, bg: ratatui::style::Color) -> TextLine<'_> {
    let used: usize = spans.iter().map(|s| display_width(&s.content)).sum();
    if used < width {
        spans.push(Span::styled(" ".repeat(width - used), Style::default().bg(bg)));
    }
    TextLine::from(spans)
}
