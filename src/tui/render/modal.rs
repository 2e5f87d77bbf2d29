use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::model::{DeleteMode, SectionId, TaskId};
use crate::session::Modal;
use crate::tui::app::{App, FilterForm, FilterRow};
use crate::util::text::truncate_to_width;

const POPUP_W: u16 = 50;

/// Render whichever dialog is open (help is drawn separately)
pub fn render_modal(frame: &mut Frame, app: &App, area: Rect) {
    let Some(modal) = app.session.modal() else {
        return;
    };
    let lines = match modal {
        Modal::Help => return,
        Modal::Filter => match &app.filter_form {
            Some(form) => filter_lines(app, form),
            None => return,
        },
        Modal::StatusPicker { task, cursor } => status_lines(app, *task, *cursor),
        Modal::AssigneePicker { task, cursor } => assignee_lines(app, *task, *cursor),
        Modal::DueDate { task, input } => due_lines(app, *task, input),
        Modal::ConfirmDelete { task } => delete_lines(app, *task),
        Modal::ConfirmSectionDelete { section, mode } => {
            section_delete_lines(app, *section, *mode)
        }
        Modal::SectionName { section, input } => section_name_lines(app, *section, input),
    };
    draw_popup(frame, app, area, lines);
}

struct Styles {
    header: Style,
    text: Style,
    bright: Style,
    dim: Style,
    cursor: Style,
    warn: Style,
}

impl Styles {
    fn of(app: &App) -> Self {
        let bg = app.theme.background;
        Styles {
            header: Style::default()
                .fg(app.theme.highlight)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
            text: Style::default().fg(app.theme.text).bg(bg),
            bright: Style::default()
                .fg(app.theme.text_bright)
                .bg(bg)
                .add_modifier(Modifier::BOLD),
            dim: Style::default().fg(app.theme.dim).bg(bg),
            cursor: Style::default()
                .fg(app.theme.text_bright)
                .bg(app.theme.selection_bg),
            warn: Style::default().fg(app.theme.red).bg(bg),
        }
    }
}

fn hints<'a>(s: &Styles, pairs: &[(&'a str, &'a str)]) -> Line<'a> {
    let mut spans = vec![Span::styled("  ", s.text)];
    for (key, what) in pairs {
        spans.push(Span::styled(*key, s.dim));
        spans.push(Span::styled(format!(" {}  ", what), s.text));
    }
    Line::from(spans)
}

fn task_title(app: &App, task: TaskId) -> String {
    app.session
        .display_name(task)
        .filter(|n| !n.is_empty())
        .unwrap_or("untitled")
        .to_string()
}

fn status_lines(app: &App, task: TaskId, cursor: usize) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    let current = app.session.board().task(task).map(|t| t.status.clone());
    let mut lines = vec![
        Line::from(Span::styled(" Status", s.header)),
        Line::from(Span::styled(
            format!("  {}", truncate_to_width(&task_title(app, task), 44)),
            s.dim,
        )),
        Line::from(""),
    ];
    for (i, def) in app.session.config().statuses.statuses.iter().enumerate() {
        let marker = if current.as_deref() == Some(def.key.as_str()) {
            "\u{25CF}"
        } else {
            " "
        };
        let style = if i == cursor { s.cursor } else { s.text };
        lines.push(Line::from(vec![
            Span::styled(format!("  {} ", marker), style.fg(app.theme.status_color(&def.key))),
            Span::styled(def.label.clone(), style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(hints(&s, &[("Enter", "select"), ("Esc", "cancel")]));
    lines
}

fn assignee_lines(app: &App, task: TaskId, cursor: usize) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    let assigned = app
        .session
        .board()
        .task(task)
        .map(|t| t.assignees.clone())
        .unwrap_or_default();
    let mut lines = vec![
        Line::from(Span::styled(" Assignees", s.header)),
        Line::from(Span::styled(
            format!("  {}", truncate_to_width(&task_title(app, task), 44)),
            s.dim,
        )),
        Line::from(""),
    ];
    if app.session.users().is_empty() {
        lines.push(Line::from(Span::styled("  No users in this project", s.dim)));
    }
    for (i, user) in app.session.users().iter().enumerate() {
        let check = if assigned.contains(&user.id) { "[x]" } else { "[ ]" };
        let style = if i == cursor { s.cursor } else { s.text };
        lines.push(Line::from(Span::styled(
            format!("  {} {}", check, user.name),
            style,
        )));
    }
    lines.push(Line::from(""));
    lines.push(hints(&s, &[("Space", "toggle"), ("Esc", "close")]));
    lines
}

fn due_lines(app: &App, task: TaskId, input: &str) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    vec![
        Line::from(Span::styled(" Due date", s.header)),
        Line::from(Span::styled(
            format!("  {}", truncate_to_width(&task_title(app, task), 44)),
            s.dim,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  > ", s.text),
            Span::styled(input.to_string(), s.bright),
            Span::styled("\u{258C}", Style::default().fg(app.theme.highlight)),
        ]),
        Line::from(Span::styled("  YYYY-MM-DD, empty clears", s.dim)),
        Line::from(""),
        hints(&s, &[("Enter", "save"), ("Esc", "cancel")]),
    ]
}

fn delete_lines(app: &App, task: TaskId) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    vec![
        Line::from(Span::styled(" Delete task", s.header)),
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", truncate_to_width(&task_title(app, task), 44)),
            s.bright,
        )),
        Line::from(""),
        hints(&s, &[("y/Enter", "delete"), ("Esc", "cancel")]),
    ]
}

fn section_delete_lines(app: &App, section: SectionId, mode: DeleteMode) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    let (name, count) = app
        .session
        .board()
        .section(section)
        .map_or((String::new(), 0), |sec| (sec.name.clone(), sec.tasks.len()));
    let radio = |on: bool| if on { "(\u{2022})" } else { "( )" };
    let mut lines = vec![
        Line::from(Span::styled(" Delete section", s.header)),
        Line::from(""),
        Line::from(Span::styled(format!("  {}", name), s.bright)),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "  {} Keep its tasks (move to first section)",
                radio(mode == DeleteMode::SectionOnly)
            ),
            s.text,
        )),
        Line::from(Span::styled(
            format!(
                "  {} Delete its {} loaded task{} too",
                radio(mode == DeleteMode::WithTasks),
                count,
                if count == 1 { "" } else { "s" }
            ),
            if mode == DeleteMode::WithTasks { s.warn } else { s.text },
        )),
        Line::from(""),
    ];
    lines.push(hints(
        &s,
        &[("Tab", "switch"), ("y/Enter", "delete"), ("Esc", "cancel")],
    ));
    lines
}

fn section_name_lines(app: &App, section: Option<SectionId>, input: &str) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    let title = if section.is_some() {
        " Rename section"
    } else {
        " New section"
    };
    vec![
        Line::from(Span::styled(title, s.header)),
        Line::from(""),
        Line::from(vec![
            Span::styled("  > ", s.text),
            Span::styled(input.to_string(), s.bright),
            Span::styled("\u{258C}", Style::default().fg(app.theme.highlight)),
        ]),
        Line::from(""),
        hints(&s, &[("Enter", "save"), ("Esc", "cancel")]),
    ]
}

fn filter_lines(app: &App, form: &FilterForm) -> Vec<Line<'static>> {
    let s = Styles::of(app);
    let statuses = &app.session.config().statuses.statuses;
    let draft = &form.draft;
    let mut lines = vec![Line::from(Span::styled(" Filter", s.header)), Line::from("")];

    for (i, row) in FilterForm::rows(statuses.len()).into_iter().enumerate() {
        let (label, value) = match row {
            FilterRow::Search => ("Search", draft.search.clone().unwrap_or_default()),
            FilterRow::Status(idx) => {
                let def = &statuses[idx];
                let on = draft.statuses.contains(&def.key);
                (
                    if idx == 0 { "Status" } else { "" },
                    format!("{} {}", if on { "[x]" } else { "[ ]" }, def.label),
                )
            }
            FilterRow::Priority => (
                "Priority",
                draft.priority.map_or("any", |p| p.as_str()).to_string(),
            ),
            FilterRow::Assignee => (
                "Assignee",
                draft.assignee.map_or_else(
                    || "any".to_string(),
                    |id| {
                        app.session
                            .user(id)
                            .map_or_else(|| format!("#{}", id), |u| u.name.clone())
                    },
                ),
            ),
            FilterRow::DueFrom => ("Due from", form.due_from.clone()),
            FilterRow::DueTo => ("Due to", form.due_to.clone()),
        };
        let style = if i == form.focus { s.cursor } else { s.text };
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<10}", label), s.dim),
            Span::styled(value, style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(hints(
        &s,
        &[
            ("\u{2191}\u{2193}", "move"),
            ("Space", "change"),
            ("Enter", "apply"),
            ("Esc", "cancel"),
        ],
    ));
    lines
}

fn draw_popup(frame: &mut Frame, app: &App, area: Rect, lines: Vec<Line<'static>>) {
    let bg = app.theme.background;
    let popup_w = POPUP_W.min(area.width.saturating_sub(2));
    let popup_h = ((lines.len() as u16) + 2).min(area.height.saturating_sub(2));
    let overlay_area = centered_rect_fixed(popup_w, popup_h, area);
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.highlight).bg(bg))
        .style(Style::default().bg(bg));
    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(bg));
    frame.render_widget(paragraph, overlay_area);
}

fn centered_rect_fixed(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}
