use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::report;
use crate::model::TaskId;
use crate::session::CursorMove;
use crate::tui::app::App;

/// Keys while a task name is being edited. Typing autosaves after the
/// debounce; Enter/Tab save at once; Esc discards.
pub(super) fn handle_edit(app: &mut App, task: TaskId, key: KeyEvent, now: Instant) {
    let session = &mut app.session;
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('w') | KeyCode::Backspace => {
                session.delete_word(task, now);
            }
            KeyCode::Char('a') => session.move_cursor(task, CursorMove::Home),
            KeyCode::Char('e') => session.move_cursor(task, CursorMove::End),
            KeyCode::Char('c') => session.cancel_edit(task),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Enter | KeyCode::Tab => {
            let result = session.submit(task, now);
            report(app, result, now);
        }
        KeyCode::Esc => session.cancel_edit(task),
        KeyCode::Backspace => {
            session.backspace(task, now);
        }
        KeyCode::Delete => {
            session.delete_forward(task, now);
        }
        KeyCode::Left => session.move_cursor(task, CursorMove::Left),
        KeyCode::Right => session.move_cursor(task, CursorMove::Right),
        KeyCode::Home => session.move_cursor(task, CursorMove::Home),
        KeyCode::End => session.move_cursor(task, CursorMove::End),
        KeyCode::Char(c) => {
            session.input_char(task, c, now);
        }
        _ => {}
    }
}
