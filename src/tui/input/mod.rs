mod edit;
mod modal;
mod navigate;

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::App;
use crate::session::{Modal, SessionError};

/// Handle a key press in whatever context is active: an open dialog, the
/// name editor, or board navigation
pub fn handle_key(app: &mut App, key: KeyEvent, now: Instant) {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return;
    }
    let key = normalize_key(key);

    if app.session.modal().is_some() {
        modal::handle_modal(app, key, now);
    } else if let Some(task) = app.session.editing_task() {
        edit::handle_edit(app, task, key, now);
    } else {
        navigate::handle_navigate(app, key, now);
    }
}

/// Bracketed paste goes to whichever text input has focus
pub fn handle_paste(app: &mut App, text: &str, now: Instant) {
    let flat: String = text.chars().filter(|c| !c.is_control()).collect();
    if matches!(app.session.modal(), Some(Modal::Filter)) {
        modal::paste_into_filter(app, &flat);
        return;
    }
    match app.session.modal_mut() {
        Some(Modal::DueDate { input, .. }) | Some(Modal::SectionName { input, .. }) => {
            input.push_str(&flat);
        }
        Some(_) => {}
        None => {
            if let Some(task) = app.session.editing_task() {
                app.session.paste(task, text, now);
            }
        }
    }
}

/// Shift+letter arrives as either 'J' or 'j'+SHIFT depending on the
/// terminal; fold both to the uppercase char
fn normalize_key(mut key: KeyEvent) -> KeyEvent {
    if let KeyCode::Char(c) = key.code
        && key.modifiers.contains(KeyModifiers::SHIFT)
        && c.is_ascii_lowercase()
    {
        key.code = KeyCode::Char(c.to_ascii_uppercase());
    }
    key
}

/// Surface a failed operation as a notice
fn report<T>(app: &mut App, result: Result<T, SessionError>, now: Instant) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(error = %e, "operation rejected");
            app.session.report(&e, now);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::api::memory::MemoryRemote;
    use crate::model::{DeleteMode, Priority, TaskId};
    use crate::session::Level;
    use crate::tui::render::test_helpers::{demo_app, settle};

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE), Instant::now());
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn first_todo(app: &App) -> TaskId {
        let todo = app.session.board().section_ids()[0];
        app.session.board().section(todo).unwrap().tasks[0]
    }

    fn server_id(task: TaskId) -> u64 {
        task.server().unwrap()
    }

    /// Select the first task of the first section
    fn select_first(app: &mut App) -> TaskId {
        press(app, KeyCode::Char('j'));
        let task = first_todo(app);
        assert_eq!(app.session.selected(), Some(task));
        task
    }

    fn backend_status(remote: &MemoryRemote, task: TaskId) -> String {
        remote.task(server_id(task)).unwrap().status
    }

    #[test]
    fn adding_a_task_creates_it_once_named() {
        let (mut app, remote) = demo_app();
        press(&mut app, KeyCode::Char('a'));
        let temp = app.session.editing_task().unwrap();
        assert!(temp.is_temp());
        type_str(&mut app, "Buy milk");
        press(&mut app, KeyCode::Enter);
        settle(&mut app, &remote);

        assert_eq!(remote.call_count("create_task"), 1);
        let todo = app.session.board().section_ids()[0];
        let names: Vec<String> = app
            .session
            .tasks_in(todo)
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names.last().map(String::as_str), Some("Buy milk"));
        assert_eq!(app.session.editing_task(), None);
    }

    #[test]
    fn escape_on_an_empty_new_row_discards_it() {
        let (mut app, remote) = demo_app();
        let todo = app.session.board().section_ids()[0];
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.session.board().section(todo).unwrap().tasks.len(), 4);
        press(&mut app, KeyCode::Esc);
        settle(&mut app, &remote);
        assert_eq!(app.session.board().section(todo).unwrap().tasks.len(), 3);
        assert_eq!(remote.call_count("create_task"), 0);
    }

    #[test]
    fn rename_through_editor() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        press(&mut app, KeyCode::Char('e'));
        for _ in 0.."notes".len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_str(&mut app, "draft");
        press(&mut app, KeyCode::Tab);
        settle(&mut app, &remote);
        assert_eq!(remote.task(server_id(task)).unwrap().name, "Write release draft");
    }

    #[test]
    fn space_toggles_completion() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.session.board().task(task).unwrap().completed);
        settle(&mut app, &remote);
        assert!(remote.task(server_id(task)).unwrap().completed);
        assert_eq!(backend_status(&remote, task), "completed");
    }

    #[test]
    fn status_picker_sets_highlighted_status() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(
            app.session.modal(),
            Some(&Modal::StatusPicker { task, cursor: 0 })
        );
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.modal(), None);
        settle(&mut app, &remote);
        assert_eq!(backend_status(&remote, task), "in_progress");
    }

    #[test]
    fn priority_cycles() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        assert_eq!(app.session.board().task(task).unwrap().priority, Priority::High);
        press(&mut app, KeyCode::Char('p'));
        settle(&mut app, &remote);
        assert_eq!(remote.task(server_id(task)).unwrap().priority, Priority::Low);
    }

    #[test]
    fn due_date_dialog_validates() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        press(&mut app, KeyCode::Char('d'));
        // Clear the prefilled date
        for _ in 0..10 {
            press(&mut app, KeyCode::Backspace);
        }
        type_str(&mut app, "2030-02-31");
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.session.modal(), Some(Modal::DueDate { .. })));
        assert_eq!(
            app.session.notices().current().map(|n| n.level),
            Some(Level::Warning)
        );

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_str(&mut app, "28");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.modal(), None);
        settle(&mut app, &remote);
        let due = remote.task(server_id(task)).unwrap().due;
        assert_eq!(due, chrono::NaiveDate::from_ymd_opt(2030, 2, 28));
    }

    #[test]
    fn assignee_picker_toggles_users() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        press(&mut app, KeyCode::Char('u'));
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Esc);
        settle(&mut app, &remote);
        let assignees: Vec<u64> = remote
            .task(server_id(task))
            .unwrap()
            .assignees
            .into_iter()
            .collect();
        assert_eq!(assignees, vec![1, 2]);
    }

    #[test]
    fn delete_requires_confirmation() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        press(&mut app, KeyCode::Char('D'));
        assert_eq!(app.session.modal(), Some(&Modal::ConfirmDelete { task }));
        press(&mut app, KeyCode::Char('n'));
        assert!(app.session.board().contains_task(task));

        press(&mut app, KeyCode::Delete);
        press(&mut app, KeyCode::Char('y'));
        assert!(!app.session.board().contains_task(task));
        settle(&mut app, &remote);
        assert!(remote.task(server_id(task)).is_none());
    }

    #[test]
    fn shift_j_moves_task_down() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        let todo = app.session.board().section_ids()[0];
        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('j'), KeyModifiers::SHIFT),
            Instant::now(),
        );
        settle(&mut app, &remote);
        assert_eq!(app.session.board().section(todo).unwrap().tasks[1], task);
        assert_eq!(remote.task_order(todo)[1], server_id(task));
    }

    #[test]
    fn move_task_to_next_section() {
        let (mut app, remote) = demo_app();
        let task = select_first(&mut app);
        let doing = app.session.board().section_ids()[1];
        press(&mut app, KeyCode::Char('L'));
        settle(&mut app, &remote);
        assert_eq!(app.session.board().owner(task), Some(doing));
        assert_eq!(remote.task_order(doing).last(), Some(&server_id(task)));
    }

    #[test]
    fn new_section_dialog() {
        let (mut app, remote) = demo_app();
        press(&mut app, KeyCode::Char('S'));
        type_str(&mut app, "Ideas");
        press(&mut app, KeyCode::Enter);
        settle(&mut app, &remote);
        let names: Vec<String> = app
            .session
            .board()
            .sections()
            .map(|s| s.name.clone())
            .collect();
        assert!(names.contains(&"Ideas".to_string()), "{:?}", names);
    }

    #[test]
    fn empty_section_name_keeps_dialog_open() {
        let (mut app, _remote) = demo_app();
        press(&mut app, KeyCode::Char('S'));
        press(&mut app, KeyCode::Enter);
        assert!(matches!(
            app.session.modal(),
            Some(Modal::SectionName { .. })
        ));
    }

    #[test]
    fn section_delete_mode_toggles() {
        let (mut app, remote) = demo_app();
        let doing = app.session.board().section_ids()[1];
        press(&mut app, KeyCode::Char(']'));
        press(&mut app, KeyCode::Char('X'));
        assert_eq!(
            app.session.modal(),
            Some(&Modal::ConfirmSectionDelete {
                section: doing,
                mode: DeleteMode::SectionOnly
            })
        );
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Enter);
        settle(&mut app, &remote);
        assert!(app.session.board().section(doing).is_none());
        assert!(!remote.section_order().contains(&doing));
    }

    #[test]
    fn filter_form_applies_status_filter() {
        let (mut app, remote) = demo_app();
        press(&mut app, KeyCode::Char('f'));
        assert!(app.filter_form.is_some());
        // Search row, then the second status row
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.modal(), None);
        assert!(app.session.filter().statuses.contains("in_progress"));
        settle(&mut app, &remote);
        let todo = app.session.board().section_ids()[0];
        assert!(app.session.board().section(todo).unwrap().tasks.is_empty());

        press(&mut app, KeyCode::Char('F'));
        assert!(!app.session.filter().is_active());
    }

    #[test]
    fn filter_search_takes_typed_and_pasted_text() {
        let (mut app, _remote) = demo_app();
        press(&mut app, KeyCode::Char('f'));
        type_str(&mut app, "bil");
        handle_paste(&mut app, "ling", Instant::now());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.filter().search.as_deref(), Some("billing"));
    }

    #[test]
    fn paste_goes_into_the_name_editor() {
        let (mut app, _remote) = demo_app();
        press(&mut app, KeyCode::Char('a'));
        let temp = app.session.editing_task().unwrap();
        handle_paste(&mut app, "line one\nline two", Instant::now());
        assert_eq!(app.session.display_name(temp), Some("line oneline two"));
    }

    #[test]
    fn collapse_current_section() {
        let (mut app, _remote) = demo_app();
        let todo = app.session.board().section_ids()[0];
        select_first(&mut app);
        press(&mut app, KeyCode::Char('z'));
        assert!(app.session.board().section(todo).unwrap().collapsed);
        assert_eq!(app.current_section(), Some(todo));
        press(&mut app, KeyCode::Char('z'));
        assert!(!app.session.board().section(todo).unwrap().collapsed);
    }

    #[test]
    fn help_and_quit() {
        let (mut app, _remote) = demo_app();
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.session.modal(), Some(&Modal::Help));
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.session.modal(), None);
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
