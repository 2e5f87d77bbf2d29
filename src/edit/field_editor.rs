use std::time::{Duration, Instant};

use super::debounce::Debouncer;
use crate::model::Field;
use crate::util::text::{next_boundary, prev_boundary, word_start_before};

/// Display/editing/submitting state of one editable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Display,
    Editing,
    /// Enter/Tab pressed; waiting for the save to resolve
    Submitting,
}

/// Inline text editor for one field of one row.
///
/// Holds the draft and a byte-offset cursor that always sits on a grapheme
/// boundary, plus the debouncer driving autosave of the draft.
#[derive(Debug, Clone)]
pub struct FieldEditor {
    pub field: Field,
    state: EditState,
    buffer: String,
    cursor: usize,
    /// Value last known to be stored (server or local record)
    saved: String,
    debounce: Debouncer,
}

impl FieldEditor {
    pub fn new(field: Field, delay: Duration) -> Self {
        FieldEditor {
            field,
            state: EditState::Display,
            buffer: String::new(),
            cursor: 0,
            saved: String::new(),
            debounce: Debouncer::new(delay),
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == EditState::Editing
    }

    pub fn is_active(&self) -> bool {
        self.state != EditState::Display
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn saved(&self) -> &str {
        &self.saved
    }

    /// Draft differs from the stored value
    pub fn is_dirty(&self) -> bool {
        self.buffer != self.saved
    }

    pub fn debounce(&self) -> &Debouncer {
        &self.debounce
    }

    pub fn debounce_mut(&mut self) -> &mut Debouncer {
        &mut self.debounce
    }

    /// Enter editing with the current stored value; cursor at the end
    pub fn begin(&mut self, value: &str) {
        if self.state != EditState::Display {
            return;
        }
        self.state = EditState::Editing;
        self.buffer = value.to_string();
        self.saved = value.to_string();
        self.cursor = self.buffer.len();
    }

    // --- Text editing (only while Editing) ---

    pub fn insert(&mut self, c: char, now: Instant) -> bool {
        if !self.is_editing() {
            return false;
        }
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
        self.debounce.touch(now);
        true
    }

    pub fn insert_str(&mut self, s: &str, now: Instant) -> bool {
        if !self.is_editing() || s.is_empty() {
            return false;
        }
        self.buffer.insert_str(self.cursor, s);
        self.cursor += s.len();
        self.debounce.touch(now);
        true
    }

    pub fn backspace(&mut self, now: Instant) -> bool {
        if !self.is_editing() {
            return false;
        }
        let Some(prev) = prev_boundary(&self.buffer, self.cursor) else {
            return false;
        };
        self.buffer.replace_range(prev..self.cursor, "");
        self.cursor = prev;
        self.debounce.touch(now);
        true
    }

    pub fn delete(&mut self, now: Instant) -> bool {
        if !self.is_editing() {
            return false;
        }
        let Some(next) = next_boundary(&self.buffer, self.cursor) else {
            return false;
        };
        self.buffer.replace_range(self.cursor..next, "");
        self.debounce.touch(now);
        true
    }

    pub fn delete_word_back(&mut self, now: Instant) -> bool {
        if !self.is_editing() || self.cursor == 0 {
            return false;
        }
        let start = word_start_before(&self.buffer, self.cursor);
        self.buffer.replace_range(start..self.cursor, "");
        self.cursor = start;
        self.debounce.touch(now);
        true
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = prev_boundary(&self.buffer, self.cursor) {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = next_boundary(&self.buffer, self.cursor) {
            self.cursor = next;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    // --- Lifecycle ---

    /// Enter/Tab: hand the draft off for saving. The debounce is bypassed
    /// and the caller sends the value immediately.
    pub fn submit(&mut self) -> Option<String> {
        if self.state != EditState::Editing {
            return None;
        }
        self.debounce.cancel();
        self.state = EditState::Submitting;
        Some(self.buffer.clone())
    }

    /// The submitted value was stored
    pub fn succeed(&mut self, stored: &str) {
        self.saved = stored.to_string();
        if self.state == EditState::Submitting {
            self.state = EditState::Display;
        }
    }

    /// The submitted value was not stored; back to editing with the draft
    /// and cursor untouched
    pub fn fail(&mut self) {
        if self.state == EditState::Submitting {
            self.state = EditState::Editing;
        }
    }

    /// A debounced save of `value` was stored while editing continues
    pub fn mark_saved(&mut self, value: &str) {
        self.saved = value.to_string();
    }

    /// Escape: discard the draft and any pending autosave. Returns the
    /// stored value the field should show again.
    pub fn cancel(&mut self) -> String {
        self.debounce.cancel();
        self.state = EditState::Display;
        self.buffer = self.saved.clone();
        self.cursor = self.buffer.len();
        self.saved.clone()
    }

    /// Replace the draft without touching the debounce (server echo while
    /// not editing)
    pub fn sync(&mut self, value: &str) {
        self.saved = value.to_string();
        if self.state == EditState::Display {
            self.buffer = value.to_string();
            self.cursor = self.buffer.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> FieldEditor {
        FieldEditor::new(Field::Name, Duration::from_millis(800))
    }

    #[test]
    fn typing_moves_cursor_by_graphemes() {
        let now = Instant::now();
        let mut e = editor();
        e.begin("");
        e.insert_str("cafe\u{0301}", now);
        assert_eq!(e.cursor(), 6);
        e.move_left();
        assert_eq!(e.cursor(), 3);
        e.backspace(now);
        assert_eq!(e.buffer(), "cae\u{0301}");
        e.move_end();
        e.backspace(now);
        assert_eq!(e.buffer(), "ca");
    }

    #[test]
    fn submit_failure_keeps_draft_and_cursor() {
        let now = Instant::now();
        let mut e = editor();
        e.begin("Plan");
        e.move_home();
        e.insert('X', now);
        assert_eq!(e.submit().as_deref(), Some("XPlan"));
        assert_eq!(e.state(), EditState::Submitting);
        assert!(!e.insert('Y', now));
        e.fail();
        assert_eq!(e.state(), EditState::Editing);
        assert_eq!(e.cursor(), 1);
        assert_eq!(e.buffer(), "XPlan");
    }

    #[test]
    fn submit_success_returns_to_display() {
        let mut e = editor();
        e.begin("Plan");
        let value = e.submit().unwrap();
        e.succeed(&value);
        assert_eq!(e.state(), EditState::Display);
        assert!(!e.is_dirty());
    }

    #[test]
    fn cancel_discards_draft_and_debounce() {
        let now = Instant::now();
        let mut e = editor();
        e.begin("Plan");
        e.insert('!', now);
        assert!(e.is_dirty());
        assert_eq!(e.cancel(), "Plan");
        assert_eq!(e.buffer(), "Plan");
        assert!(e.debounce().is_idle());
    }

    #[test]
    fn delete_word_back_removes_last_word() {
        let now = Instant::now();
        let mut e = editor();
        e.begin("write the docs");
        e.delete_word_back(now);
        assert_eq!(e.buffer(), "write the ");
    }
}
