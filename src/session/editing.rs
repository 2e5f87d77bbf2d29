use std::time::Instant;

use super::{Inflight, SaveOrigin, Session, SessionError, unexpected};
use crate::api::{ApiError, Reply, Request, RequestId};
use crate::edit::{FieldEditor, ValidationError, validate_name};
use crate::model::{Field, SectionId, Task, TaskFields, TaskId};
use crate::optimistic::Mutation;

/// Cursor movement inside the name editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Left,
    Right,
    Home,
    End,
}

impl Session {
    // ---------------------------------------------------------------------
    // Rows
    // ---------------------------------------------------------------------

    /// Insert an empty temporary row at the end of `section` and start
    /// editing its name. Nothing is sent until the row has a name.
    pub fn add_task(&mut self, section: SectionId) -> Result<TaskId, SessionError> {
        let len = self
            .board
            .section(section)
            .map(|s| s.tasks.len())
            .ok_or(SessionError::UnknownSection(section))?;
        self.next_temp += 1;
        let id = TaskId::Temp(self.next_temp);
        let task = Task::temporary(id, self.config.statuses.default_key());
        self.board.attach_task(section, len, task)?;
        if let Some(sec) = self.board.section_mut(section) {
            sec.collapsed = false;
        }
        let delay = self.delay();
        self.rows.ensure(id, delay).name.begin("");
        self.selected = Some(id);
        tracing::debug!(task = %id, section, "temporary row added");
        Ok(id)
    }

    /// Open the name editor of a task
    pub fn begin_edit(&mut self, task: TaskId) -> Result<(), SessionError> {
        let name = self
            .board
            .task(task)
            .map(|t| t.name.clone())
            .ok_or(SessionError::UnknownTask(task))?;
        let delay = self.delay();
        self.rows.ensure(task, delay).name.begin(&name);
        self.selected = Some(task);
        Ok(())
    }

    pub fn is_editing(&self, task: TaskId) -> bool {
        self.rows.get(task).is_some_and(|r| r.name.is_active())
    }

    /// The task whose name editor is open, if any
    pub fn editing_task(&self) -> Option<TaskId> {
        self.rows.active().next().map(|r| r.task)
    }

    fn edit_with(&mut self, task: TaskId, f: impl FnOnce(&mut FieldEditor) -> bool) -> bool {
        let Some(row) = self.rows.get_mut(task) else {
            return false;
        };
        let changed = f(&mut row.name);
        if changed && task.is_temp() {
            row.touched.insert(Field::Name);
        }
        changed
    }

    pub fn input_char(&mut self, task: TaskId, c: char, now: Instant) -> bool {
        self.edit_with(task, |e| e.insert(c, now))
    }

    pub fn paste(&mut self, task: TaskId, text: &str, now: Instant) -> bool {
        // Names are single-line
        let flat: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        self.edit_with(task, |e| e.insert_str(&flat, now))
    }

    pub fn backspace(&mut self, task: TaskId, now: Instant) -> bool {
        self.edit_with(task, |e| e.backspace(now))
    }

    pub fn delete_forward(&mut self, task: TaskId, now: Instant) -> bool {
        self.edit_with(task, |e| e.delete(now))
    }

    pub fn delete_word(&mut self, task: TaskId, now: Instant) -> bool {
        self.edit_with(task, |e| e.delete_word_back(now))
    }

    pub fn move_cursor(&mut self, task: TaskId, movement: CursorMove) {
        let Some(row) = self.rows.get_mut(task) else {
            return;
        };
        match movement {
            CursorMove::Left => row.name.move_left(),
            CursorMove::Right => row.name.move_right(),
            CursorMove::Home => row.name.move_home(),
            CursorMove::End => row.name.move_end(),
        }
    }

    // ---------------------------------------------------------------------
    // Submit / cancel / autosave
    // ---------------------------------------------------------------------

    /// Enter/Tab: save the draft now, bypassing the debounce.
    ///
    /// Invalid names keep the editor open and return the validation error
    /// without sending anything. A submit while a save is in flight leaves
    /// the editor open.
    pub fn submit(&mut self, task: TaskId, now: Instant) -> Result<Option<RequestId>, SessionError> {
        if self.guard.is_busy(task) {
            tracing::debug!(%task, "submit ignored: save in flight");
            return Ok(None);
        }
        let row = self.rows.get_mut(task).ok_or(SessionError::UnknownTask(task))?;
        let Some(draft) = row.name.submit() else {
            return Ok(None);
        };
        self.flush_row(task, draft, SaveOrigin::Submit, now)
    }

    /// Escape: discard the draft. An untouched temporary row disappears.
    pub fn cancel_edit(&mut self, task: TaskId) {
        let Some(row) = self.rows.get_mut(task) else {
            return;
        };
        let stored = row.name.cancel();
        let unsent = task.is_temp() && row.creating.is_none();
        if unsent && stored.is_empty() && !self.guard.is_busy(task) {
            tracing::debug!(%task, "empty temporary row discarded");
            self.evict(task);
        }
    }

    /// Stop every pending autosave (the view is going away)
    pub fn unmount(&mut self) {
        for task in self.rows.tasks() {
            if let Some(row) = self.rows.get_mut(task) {
                row.name.debounce_mut().cancel();
            }
        }
    }

    /// Run autosaves whose quiet period has elapsed. Rows with a save in
    /// flight wait for it to resolve.
    pub(super) fn flush_due_edits(&mut self, now: Instant) {
        for task in self.rows.tasks() {
            if self.guard.is_busy(task) {
                continue;
            }
            let Some(row) = self.rows.get_mut(task) else {
                continue;
            };
            if !row.name.is_editing() || !row.name.debounce_mut().poll(now) {
                continue;
            }
            let draft = row.name.buffer().to_string();
            if let Err(e) = self.flush_row(task, draft, SaveOrigin::Autosave, now) {
                tracing::debug!(%task, error = %e, "autosave skipped");
            }
        }
    }

    fn flush_row(
        &mut self,
        task: TaskId,
        draft: String,
        origin: SaveOrigin,
        now: Instant,
    ) -> Result<Option<RequestId>, SessionError> {
        let max = self.config.autosave.max_name_len;
        if let Err(e) = validate_name(&draft, max) {
            self.reject_draft(task, origin, now);
            // Autosave waits silently on an empty draft
            if origin == SaveOrigin::Autosave {
                if matches!(e, ValidationError::NameTooLong { .. }) {
                    self.notices.warn(e.to_string(), now);
                }
                return Ok(None);
            }
            return Err(e.into());
        }
        if task.is_temp() {
            let sent = self.create_row(task, draft, origin);
            self.settle_debounce(task, origin, sent.is_some(), now);
            return Ok(sent);
        }
        let unchanged = self.board.task(task).is_some_and(|t| t.name == draft);
        if unchanged {
            if let Some(row) = self.rows.get_mut(task) {
                match origin {
                    SaveOrigin::Submit => row.name.succeed(&draft),
                    _ => {
                        row.name.mark_saved(&draft);
                        row.name.debounce_mut().finish(now);
                    }
                }
            }
            return Ok(None);
        }
        let patch = TaskFields {
            name: Some(draft),
            ..Default::default()
        };
        let sent = self.save_patch(task, patch, origin, false)?;
        self.settle_debounce(task, origin, sent.is_some(), now);
        Ok(sent)
    }

    /// Put the editor back after a draft that could not be saved
    fn reject_draft(&mut self, task: TaskId, origin: SaveOrigin, now: Instant) {
        if let Some(row) = self.rows.get_mut(task) {
            match origin {
                SaveOrigin::Submit => row.name.fail(),
                _ => row.name.debounce_mut().finish(now),
            }
        }
    }

    fn settle_debounce(&mut self, task: TaskId, origin: SaveOrigin, sent: bool, now: Instant) {
        let Some(row) = self.rows.get_mut(task) else {
            return;
        };
        match (origin, sent) {
            (SaveOrigin::Autosave, true) => row.name.debounce_mut().finish(now),
            (SaveOrigin::Autosave, false) => row.name.debounce_mut().defer(now),
            (SaveOrigin::Submit, false) => row.name.fail(),
            _ => {}
        }
    }

    /// A field other than the name changed on a temporary row: create it
    /// now if the draft is a valid name
    pub(super) fn create_if_named(&mut self, task: TaskId, origin: SaveOrigin) -> Option<RequestId> {
        let row = self.rows.get(task)?;
        if row.creating.is_some() || self.guard.is_busy(task) {
            return None;
        }
        let draft = if row.name.is_active() {
            row.name.buffer().to_string()
        } else {
            self.board.task(task)?.name.clone()
        };
        validate_name(&draft, self.config.autosave.max_name_len).ok()?;
        let sent = self.create_row(task, draft, origin);
        if sent.is_some()
            && let Some(row) = self.rows.get_mut(task)
        {
            row.name.debounce_mut().cancel();
        }
        sent
    }

    /// Send the create for a temporary row: the name plus every field the
    /// user touched, in one request
    fn create_row(&mut self, task: TaskId, name: String, origin: SaveOrigin) -> Option<RequestId> {
        let section = self.board.owner(task)?;
        let id = self.next_id();
        if !self.guard.try_acquire(task, id) {
            tracing::debug!(%task, "create deferred: request in flight");
            return None;
        }
        if let Some(record) = self.board.task_mut(task) {
            record.name = name;
            record.saving = true;
        }
        self.clock.stamp(task, &[Field::Name]);
        let stamp = self.clock.mark();
        let delay = self.delay();
        let row = self.rows.ensure(task, delay);
        row.touched.insert(Field::Name);
        row.creating = Some(id);
        let keep: Vec<Field> = row.touched.iter().copied().collect();
        let fields = self
            .board
            .task(task)
            .map(|t| TaskFields::from_task(t).retain(&keep))
            .unwrap_or_default();
        self.send_as(
            id,
            Request::CreateTask {
                section,
                fields: fields.clone(),
            },
            Inflight::Create {
                task,
                origin,
                stamp,
                sent: fields,
            },
        );
        Some(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn on_create(
        &mut self,
        id: RequestId,
        task: TaskId,
        origin: SaveOrigin,
        stamp: u64,
        sent: TaskFields,
        result: Result<Reply, ApiError>,
        now: Instant,
    ) {
        self.guard.release(task, id);
        let result = result.and_then(|reply| match reply {
            Reply::Task(t) => Ok(t),
            other => Err(unexpected(other)),
        });
        let server = match result {
            Ok(server) => server,
            Err(e) => {
                self.set_saving(&[task], false);
                if let Some(row) = self.rows.get_mut(task) {
                    row.creating = None;
                    if origin == SaveOrigin::Submit {
                        row.name.fail();
                    }
                }
                self.notices
                    .error(format!("Could not create task: {}", e), now);
                return;
            }
        };
        let new_id = server.id;
        if let Err(e) = self.board.rekey_task(task, new_id) {
            tracing::warn!(%task, server = %new_id, error = %e, "created task could not be rekeyed");
            self.rows.remove(task);
            return;
        }
        self.rows.rekey(task, new_id);
        self.clock.rekey(task, new_id);
        self.ledger.rekey(task, new_id);
        self.guard.rekey(task, new_id);
        if self.selected == Some(task) {
            self.selected = Some(new_id);
        }
        tracing::info!(temp = %task, task = %new_id, "task created");

        let kept = self.adopt(new_id, &server, stamp);
        if let Some(record) = self.board.task_mut(new_id) {
            record.initial = false;
            record.saving = false;
        }
        let mut follow = self
            .board
            .task(new_id)
            .map(|t| TaskFields::from_task(t).retain(&kept))
            .unwrap_or_default();
        let mut inverse = TaskFields::from_task(&server).retain(&kept);

        let max = self.config.autosave.max_name_len;
        let sent_name = sent.name.unwrap_or_default();
        if let Some(row) = self.rows.get_mut(new_id) {
            row.creating = None;
            row.touched.clear();
            match origin {
                SaveOrigin::Submit => row.name.succeed(&sent_name),
                _ => row.name.mark_saved(&sent_name),
            }
            // Typing that continued while the create was in flight
            let draft = row.name.buffer().to_string();
            if row.name.is_editing() && draft != sent_name && validate_name(&draft, max).is_ok() {
                row.name.debounce_mut().cancel();
                follow.name = Some(draft);
                inverse.name = Some(server.name.clone());
            }
        }
        if follow.is_empty() {
            return;
        }
        tracing::debug!(task = %new_id, fields = ?follow.fields(), "sending follow-up update");
        let mutation = Mutation::Patch {
            task: new_id,
            patch: follow,
            inverse,
        };
        if let Err(e) = self.send_update(new_id, mutation, SaveOrigin::Direct, true) {
            self.report(&e, now);
        }
    }
}
