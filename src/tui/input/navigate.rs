use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::report;
use crate::model::{DeleteMode, FilterState, SectionId, TaskId};
use crate::session::Modal;
use crate::tui::app::{App, FilterForm};

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent, now: Instant) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('d') => half_page(app, 1, now),
            KeyCode::Char('u') => half_page(app, -1, now),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.session.open_modal(Modal::Help),
        KeyCode::Esc => app.session.notices_mut().clear(),

        // Movement
        KeyCode::Char('j') | KeyCode::Down => app.session.move_selection(1, now),
        KeyCode::Char('k') | KeyCode::Up => app.session.move_selection(-1, now),
        KeyCode::Char('g') | KeyCode::Home => app.session.move_selection(isize::MIN, now),
        KeyCode::Char('G') | KeyCode::End => app.session.move_selection(isize::MAX, now),
        KeyCode::PageDown => {
            let page = app.session.viewport() as isize;
            app.session.scroll_by(page, now);
        }
        KeyCode::PageUp => {
            let page = app.session.viewport() as isize;
            app.session.scroll_by(-page, now);
        }
        KeyCode::Char(']') => app.jump_section(1, now),
        KeyCode::Char('[') => app.jump_section(-1, now),
        KeyCode::Tab | KeyCode::Char('z') => toggle_collapse(app, now),

        // Task editing
        KeyCode::Char('a') => add_task(app, now),
        KeyCode::Enter | KeyCode::Char('e') => with_task(app, now, |app, task, now| {
            let result = app.session.begin_edit(task);
            report(app, result, now);
        }),
        KeyCode::Char('x') | KeyCode::Char(' ') => with_task(app, now, |app, task, now| {
            let result = app.session.toggle_complete(task);
            report(app, result, now);
        }),
        KeyCode::Char('p') => with_task(app, now, |app, task, now| {
            let Some(priority) = app.session.board().task(task).map(|t| t.priority.next()) else {
                return;
            };
            let result = app.session.set_priority(task, priority);
            report(app, result, now);
        }),
        KeyCode::Char('s') => with_task(app, now, |app, task, _| {
            let statuses = &app.session.config().statuses;
            let cursor = app
                .session
                .board()
                .task(task)
                .and_then(|t| {
                    statuses
                        .statuses
                        .iter()
                        .position(|s| s.key.eq_ignore_ascii_case(&t.status))
                })
                .unwrap_or(0);
            app.session.open_modal(Modal::StatusPicker { task, cursor });
        }),
        KeyCode::Char('u') => with_task(app, now, |app, task, _| {
            app.session
                .open_modal(Modal::AssigneePicker { task, cursor: 0 });
        }),
        KeyCode::Char('d') => with_task(app, now, |app, task, _| {
            let input = app
                .session
                .board()
                .task(task)
                .and_then(|t| t.due)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            app.session.open_modal(Modal::DueDate { task, input });
        }),
        KeyCode::Char('D') | KeyCode::Delete => with_task(app, now, |app, task, _| {
            app.session.open_modal(Modal::ConfirmDelete { task });
        }),
        KeyCode::Char('J') => shift_task(app, 1, now),
        KeyCode::Char('K') => shift_task(app, -1, now),
        KeyCode::Char('L') => move_to_section(app, 1, now),
        KeyCode::Char('H') => move_to_section(app, -1, now),

        // Board
        KeyCode::Char('f') => {
            app.filter_form = Some(FilterForm::new(app.session.filter()));
            app.session.open_modal(Modal::Filter);
        }
        KeyCode::Char('F') => app.session.set_filter(FilterState::default()),
        KeyCode::Char('S') => app.session.open_modal(Modal::SectionName {
            section: None,
            input: String::new(),
        }),
        KeyCode::Char('R') => {
            if let Some(section) = app.current_section() {
                let input = app
                    .session
                    .board()
                    .section(section)
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                app.session.open_modal(Modal::SectionName {
                    section: Some(section),
                    input,
                });
            }
        }
        KeyCode::Char('X') => {
            if let Some(section) = app.current_section() {
                app.session.open_modal(Modal::ConfirmSectionDelete {
                    section,
                    mode: DeleteMode::SectionOnly,
                });
            }
        }
        KeyCode::Char('<') => shift_section(app, -1, now),
        KeyCode::Char('>') => shift_section(app, 1, now),
        _ => {}
    }
}

/// Run `f` on the selected task, if any
fn with_task(app: &mut App, now: Instant, f: impl FnOnce(&mut App, TaskId, Instant)) {
    if let Some(task) = app.session.selected() {
        f(app, task, now);
    }
}

fn half_page(app: &mut App, dir: isize, now: Instant) {
    let step = (app.session.viewport() / 2).max(1) as isize;
    app.session.scroll_by(dir * step, now);
}

fn toggle_collapse(app: &mut App, now: Instant) {
    let Some(section) = app.current_section() else {
        return;
    };
    app.focus = Some(section);
    let result = app.session.toggle_collapse(section);
    if report(app, result, now).is_some() {
        app.session.reveal_section(section, now);
    }
}

fn add_task(app: &mut App, now: Instant) {
    let Some(section) = app.current_section() else {
        return;
    };
    let result = app.session.add_task(section);
    if let Some(task) = report(app, result, now) {
        app.focus = Some(section);
        app.session.reveal(task, now);
    }
}

/// Move the selected task one slot within its section
fn shift_task(app: &mut App, delta: isize, now: Instant) {
    let Some(task) = app.session.selected() else {
        return;
    };
    let Some((section, from)) = app.session.board().locate(task) else {
        return;
    };
    let len = app
        .session
        .board()
        .section(section)
        .map_or(0, |s| s.tasks.len());
    let to = from.saturating_add_signed(delta);
    if to == from || to >= len {
        return;
    }
    let result = app.session.reorder_task(section, from, to);
    report(app, result, now);
    app.session.reveal(task, now);
}

/// Move the selected task to the end of the neighbouring section
fn move_to_section(app: &mut App, delta: isize, now: Instant) {
    let Some(task) = app.session.selected() else {
        return;
    };
    let Some(target) = neighbour(app, delta) else {
        return;
    };
    let index = app
        .session
        .board()
        .section(target)
        .map_or(0, |s| s.tasks.len());
    let result = app.session.move_task(task, target, index);
    if report(app, result, now).is_some() {
        app.focus = Some(target);
        app.session.reveal(task, now);
    }
}

fn neighbour(app: &App, delta: isize) -> Option<SectionId> {
    let ids = app.session.board().section_ids();
    let here = ids.iter().position(|id| Some(*id) == app.current_section())?;
    let there = here.checked_add_signed(delta)?;
    ids.get(there).copied()
}

fn shift_section(app: &mut App, delta: isize, now: Instant) {
    let Some(section) = app.current_section() else {
        return;
    };
    let Some(from) = app.session.board().section_index(section) else {
        return;
    };
    let Some(to) = from.checked_add_signed(delta) else {
        return;
    };
    if to >= app.session.board().section_count() {
        return;
    }
    let result = app.session.reorder_section(section, to);
    if report(app, result, now).is_some() {
        app.focus = Some(section);
        app.session.reveal_section(section, now);
    }
}
