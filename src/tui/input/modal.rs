use std::time::Instant;

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent};

use super::report;
use crate::model::{DeleteMode, SectionId, TaskId};
use crate::session::Modal;
use crate::tui::app::{App, FilterForm, FilterRow, next_priority};

pub(super) fn handle_modal(app: &mut App, key: KeyEvent, now: Instant) {
    let Some(modal) = app.session.modal().cloned() else {
        return;
    };
    match modal {
        Modal::Help => {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                app.session.close_modal();
            }
        }
        Modal::Filter => filter_key(app, key, now),
        Modal::StatusPicker { task, cursor } => status_key(app, task, cursor, key, now),
        Modal::AssigneePicker { task, cursor } => assignee_key(app, task, cursor, key, now),
        Modal::DueDate { task, input } => due_key(app, task, input, key, now),
        Modal::ConfirmDelete { task } => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.session.close_modal();
                let result = app.session.delete_task(task);
                report(app, result, now);
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                app.session.close_modal();
            }
            _ => {}
        },
        Modal::ConfirmSectionDelete { section, mode } => {
            section_delete_key(app, section, mode, key, now)
        }
        Modal::SectionName { section, input } => section_name_key(app, section, input, key, now),
    }
}

/// New cursor after an up/down key over `len` entries
fn step_cursor(cursor: usize, len: usize, key: &KeyEvent) -> Option<usize> {
    let last = len.checked_sub(1)?;
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => Some((cursor + 1).min(last)),
        KeyCode::Up | KeyCode::Char('k') => Some(cursor.saturating_sub(1)),
        _ => None,
    }
}

fn status_key(app: &mut App, task: TaskId, cursor: usize, key: KeyEvent, now: Instant) {
    let len = app.session.config().statuses.statuses.len();
    if let Some(cursor) = step_cursor(cursor, len, &key) {
        app.session.open_modal(Modal::StatusPicker { task, cursor });
        return;
    }
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.session.close_modal();
            let Some(status) = app
                .session
                .config()
                .statuses
                .statuses
                .get(cursor)
                .map(|s| s.key.clone())
            else {
                return;
            };
            let result = app.session.set_status(task, &status);
            report(app, result, now);
        }
        KeyCode::Esc => {
            app.session.close_modal();
        }
        _ => {}
    }
}

fn assignee_key(app: &mut App, task: TaskId, cursor: usize, key: KeyEvent, now: Instant) {
    let len = app.session.users().len();
    if let Some(cursor) = step_cursor(cursor, len, &key) {
        app.session.open_modal(Modal::AssigneePicker { task, cursor });
        return;
    }
    match key.code {
        KeyCode::Char(' ') | KeyCode::Char('x') => {
            let Some(user) = app.session.users().get(cursor).map(|u| u.id) else {
                return;
            };
            let result = app.session.toggle_assignee(task, user);
            report(app, result, now);
        }
        KeyCode::Enter | KeyCode::Esc => {
            app.session.close_modal();
        }
        _ => {}
    }
}

fn due_key(app: &mut App, task: TaskId, mut input: String, key: KeyEvent, now: Instant) {
    match key.code {
        KeyCode::Enter => {
            let due = match parse_date(&input) {
                Ok(due) => due,
                Err(msg) => {
                    app.session.notices_mut().warn(msg, now);
                    return;
                }
            };
            app.session.close_modal();
            let result = app.session.set_due(task, due);
            report(app, result, now);
        }
        KeyCode::Esc => {
            app.session.close_modal();
        }
        KeyCode::Backspace => {
            input.pop();
            app.session.open_modal(Modal::DueDate { task, input });
        }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => {
            input.push(c);
            app.session.open_modal(Modal::DueDate { task, input });
        }
        _ => {}
    }
}

fn section_delete_key(
    app: &mut App,
    section: SectionId,
    mode: DeleteMode,
    key: KeyEvent,
    now: Instant,
) {
    match key.code {
        KeyCode::Tab | KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
            let mode = match mode {
                DeleteMode::SectionOnly => DeleteMode::WithTasks,
                DeleteMode::WithTasks => DeleteMode::SectionOnly,
            };
            app.session
                .open_modal(Modal::ConfirmSectionDelete { section, mode });
        }
        KeyCode::Char('y') | KeyCode::Enter => {
            app.session.close_modal();
            let result = app.session.delete_section(section, mode);
            if report(app, result, now).is_some() {
                app.focus = None;
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            app.session.close_modal();
        }
        _ => {}
    }
}

fn section_name_key(
    app: &mut App,
    section: Option<SectionId>,
    mut input: String,
    key: KeyEvent,
    now: Instant,
) {
    match key.code {
        KeyCode::Enter => {
            let ok = match section {
                Some(id) => {
                    let result = app.session.rename_section(id, &input);
                    report(app, result, now).is_some()
                }
                None => {
                    let result = app.session.create_section(&input);
                    report(app, result, now).is_some()
                }
            };
            if ok {
                app.session.close_modal();
            }
        }
        KeyCode::Esc => {
            app.session.close_modal();
        }
        KeyCode::Backspace => {
            input.pop();
            app.session.open_modal(Modal::SectionName { section, input });
        }
        KeyCode::Char(c) => {
            input.push(c);
            app.session.open_modal(Modal::SectionName { section, input });
        }
        _ => {}
    }
}

fn filter_key(app: &mut App, key: KeyEvent, now: Instant) {
    let Some(mut form) = app.filter_form.take() else {
        app.session.close_modal();
        return;
    };
    let statuses: Vec<String> = app
        .session
        .config()
        .statuses
        .statuses
        .iter()
        .map(|s| s.key.clone())
        .collect();
    let rows = FilterForm::rows(statuses.len());
    let row = rows.get(form.focus).copied().unwrap_or(FilterRow::Search);

    match key.code {
        KeyCode::Esc => {
            app.session.close_modal();
            return;
        }
        KeyCode::Enter => match apply_form(&form) {
            Ok(filter) => {
                app.session.close_modal();
                app.session.set_filter(filter);
                return;
            }
            Err(msg) => app.session.notices_mut().warn(msg, now),
        },
        KeyCode::Down | KeyCode::Tab => form.focus = (form.focus + 1).min(rows.len() - 1),
        KeyCode::Up | KeyCode::BackTab => form.focus = form.focus.saturating_sub(1),
        KeyCode::Backspace => {
            if let Some(text) = text_field(&mut form, row) {
                text.pop();
            }
        }
        KeyCode::Char(c) => match row {
            FilterRow::Search => form.draft.search.get_or_insert_with(String::new).push(c),
            FilterRow::DueFrom | FilterRow::DueTo => {
                if (c.is_ascii_digit() || c == '-')
                    && let Some(text) = text_field(&mut form, row)
                {
                    text.push(c);
                }
            }
            FilterRow::Status(i) if c == ' ' => form.draft.toggle_status(&statuses[i]),
            FilterRow::Priority if c == ' ' => {
                form.draft.priority = next_priority(form.draft.priority)
            }
            FilterRow::Assignee if c == ' ' => {
                form.draft.assignee = next_assignee(app, form.draft.assignee)
            }
            _ => {}
        },
        _ => {}
    }
    app.filter_form = Some(form);
}

/// Paste lands in the focused text row of the filter form
pub(super) fn paste_into_filter(app: &mut App, text: &str) {
    let rows = FilterForm::rows(app.session.config().statuses.statuses.len());
    let Some(form) = app.filter_form.as_mut() else {
        return;
    };
    let row = rows.get(form.focus).copied().unwrap_or(FilterRow::Search);
    if let Some(field) = text_field(form, row) {
        field.push_str(text);
    }
}

fn text_field(form: &mut FilterForm, row: FilterRow) -> Option<&mut String> {
    match row {
        FilterRow::Search => Some(form.draft.search.get_or_insert_with(String::new)),
        FilterRow::DueFrom => Some(&mut form.due_from),
        FilterRow::DueTo => Some(&mut form.due_to),
        _ => None,
    }
}

/// Cycle any → each user → any
fn next_assignee(app: &App, current: Option<u64>) -> Option<u64> {
    let users = app.session.users();
    match current {
        None => users.first().map(|u| u.id),
        Some(id) => {
            let at = users.iter().position(|u| u.id == id)?;
            users.get(at + 1).map(|u| u.id)
        }
    }
}

/// The form's draft as a filter, with dates parsed and a blank search
/// dropped
fn apply_form(form: &FilterForm) -> Result<crate::model::FilterState, String> {
    let mut filter = form.draft.clone();
    filter.search = filter
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    filter.due.from = parse_date(&form.due_from)?;
    filter.due.to = parse_date(&form.due_to)?;
    if let (Some(from), Some(to)) = (filter.due.from, filter.due.to)
        && from > to
    {
        return Err("due range ends before it starts".to_string());
    }
    Ok(filter)
}

/// `YYYY-MM-DD`, or empty for no date
fn parse_date(input: &str) -> Result<Option<NaiveDate>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("invalid date: {} (use YYYY-MM-DD)", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FilterState;
    use pretty_assertions::assert_eq;

    #[test]
    fn dates_parse_or_clear() {
        assert_eq!(parse_date(""), Ok(None));
        assert_eq!(parse_date(" 2025-06-30 "), Ok(NaiveDate::from_ymd_opt(2025, 6, 30)));
        assert!(parse_date("30/06/2025").is_err());
    }

    #[test]
    fn form_rejects_inverted_range() {
        let mut form = FilterForm::new(&FilterState::default());
        form.due_from = "2025-07-01".into();
        form.due_to = "2025-06-01".into();
        assert!(apply_form(&form).is_err());
        form.due_to = "2025-07-31".into();
        let filter = apply_form(&form).unwrap();
        assert_eq!(filter.due.to, NaiveDate::from_ymd_opt(2025, 7, 31));
    }

    #[test]
    fn blank_search_is_dropped() {
        let mut form = FilterForm::new(&FilterState::default());
        form.draft.search = Some("   ".into());
        assert_eq!(apply_form(&form).unwrap().search, None);
    }
}
