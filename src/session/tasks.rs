use std::collections::BTreeSet;
use std::time::Instant;

use chrono::NaiveDate;

use super::{Inflight, SaveOrigin, Session, SessionError, unexpected};
use crate::api::{ApiError, Reply, Request, RequestId};
use crate::model::{Priority, SectionId, Task, TaskFields, TaskId, UserId};
use crate::ops::task_ops::{
    completion_patch, persisted_order, plan_bulk_patch, plan_bulk_remove, plan_move, plan_patch,
    plan_remove, plan_reorder, server_index, status_patch,
};
use crate::optimistic::Mutation;

impl Session {
    // ---------------------------------------------------------------------
    // Ordering
    // ---------------------------------------------------------------------

    /// Drag a task within its section from `from` to `to`.
    ///
    /// The cache changes at once. Persisted tasks send the section's full
    /// persisted order; a dragged temporary row stays local because the
    /// server-visible order does not change.
    pub fn reorder_task(
        &mut self,
        section: SectionId,
        from: usize,
        to: usize,
    ) -> Result<Option<RequestId>, SessionError> {
        let Some(mutation) = plan_reorder(&self.board, section, from, to)? else {
            return Ok(None);
        };
        let Mutation::Reorder { task, .. } = mutation else {
            return Ok(None);
        };
        if task.is_temp() {
            mutation.apply(&mut self.board)?;
            return Ok(None);
        }
        let id = self.next_id();
        if !self.guard.try_acquire_ordering(task, &[section], id) {
            tracing::debug!(%task, section, "reorder rejected: save or reorder in flight");
            return Ok(None);
        }
        mutation.apply(&mut self.board)?;
        let ordered = persisted_order(&self.board, section);
        self.ledger.record(id, mutation, 0);
        self.set_saving(&[task], true);
        self.send_as(
            id,
            Request::ReorderTasks { section, ordered },
            Inflight::Mutation {
                label: "reorder tasks",
                tasks: vec![task],
                forget: Vec::new(),
            },
        );
        Ok(Some(id))
    }

    /// Move a task into another section at `to_index`
    pub fn move_task(
        &mut self,
        task: TaskId,
        to_section: SectionId,
        to_index: usize,
    ) -> Result<Option<RequestId>, SessionError> {
        let mutation = plan_move(&self.board, task, to_section, to_index)?;
        let Mutation::Move { from_section, .. } = mutation else {
            return Ok(None);
        };
        if task.is_temp() {
            // The pending create targets whatever section owns the row
            mutation.apply(&mut self.board)?;
            return Ok(None);
        }
        let id = self.next_id();
        if !self.guard.try_acquire_ordering(task, &[from_section, to_section], id) {
            tracing::debug!(%task, to_section, "move rejected: save or reorder in flight");
            return Ok(None);
        }
        mutation.apply(&mut self.board)?;
        let landed = self
            .board
            .locate(task)
            .map_or(0, |(_, index)| server_index(&self.board, to_section, index));
        self.ledger.record(id, mutation, 0);
        self.set_saving(&[task], true);
        let server_id = task.server().ok_or(SessionError::UnknownTask(task))?;
        self.send_as(
            id,
            Request::MoveTask {
                task: server_id,
                from: from_section,
                to: to_section,
                dest_index: landed,
            },
            Inflight::Mutation {
                label: "move task",
                tasks: vec![task],
                forget: Vec::new(),
            },
        );
        Ok(Some(id))
    }

    // ---------------------------------------------------------------------
    // Field updates
    // ---------------------------------------------------------------------

    /// User-initiated field change (dropdown, toggle, date picker).
    ///
    /// Applied locally at once. Persisted tasks send a forced update; a
    /// temporary row records the field for its create bundle and creates
    /// itself once it has a name.
    pub fn update_fields(
        &mut self,
        task: TaskId,
        patch: TaskFields,
    ) -> Result<Option<RequestId>, SessionError> {
        if patch.is_empty() {
            return Ok(None);
        }
        if !self.board.contains_task(task) {
            return Err(SessionError::UnknownTask(task));
        }
        if task.is_temp() {
            let mutation = plan_patch(&self.board, task, patch.clone())?;
            mutation.apply(&mut self.board)?;
            self.clock.stamp(task, &patch.fields());
            let delay = self.delay();
            self.rows.ensure(task, delay).touched.extend(patch.fields());
            return Ok(self.create_if_named(task, SaveOrigin::Direct));
        }
        self.save_patch(task, patch, SaveOrigin::Direct, true)
    }

    /// Apply a patch to a persisted task and send it. Rejected (not queued)
    /// when another save for the task is in flight.
    pub(super) fn save_patch(
        &mut self,
        task: TaskId,
        patch: TaskFields,
        origin: SaveOrigin,
        force: bool,
    ) -> Result<Option<RequestId>, SessionError> {
        let record = self.board.task(task).ok_or(SessionError::UnknownTask(task))?;
        if !force && patch.is_noop_for(record) {
            tracing::debug!(%task, "update suppressed: no change");
            return Ok(None);
        }
        let mutation = plan_patch(&self.board, task, patch)?;
        self.send_update(task, mutation, origin, force)
    }

    /// Apply a `Mutation::Patch` and send it as an update, recording it in
    /// the ledger under a fresh field stamp
    pub(super) fn send_update(
        &mut self,
        task: TaskId,
        mutation: Mutation,
        origin: SaveOrigin,
        force: bool,
    ) -> Result<Option<RequestId>, SessionError> {
        let Mutation::Patch { patch, .. } = &mutation else {
            return Ok(None);
        };
        let patch = patch.clone();
        let server_id = task.server().ok_or(SessionError::UnknownTask(task))?;
        let id = self.next_id();
        if !self.guard.try_acquire(task, id) {
            tracing::debug!(%task, "save rejected: another save in flight");
            return Ok(None);
        }
        mutation.apply(&mut self.board)?;
        let stamp = self.clock.stamp(task, &patch.fields());
        self.ledger.record(id, mutation, stamp);
        self.set_saving(&[task], true);
        self.send_as(
            id,
            Request::UpdateTask {
                task: server_id,
                fields: patch.clone(),
                force,
            },
            Inflight::Save {
                task,
                origin,
                stamp,
                sent: patch,
            },
        );
        Ok(Some(id))
    }

    pub fn toggle_complete(
        &mut self,
        task: TaskId,
    ) -> Result<Option<RequestId>, SessionError> {
        let record = self.board.task(task).ok_or(SessionError::UnknownTask(task))?;
        let patch = completion_patch(record, &self.config.statuses);
        self.update_fields(task, patch)
    }

    pub fn set_status(
        &mut self,
        task: TaskId,
        status: &str,
    ) -> Result<Option<RequestId>, SessionError> {
        let record = self.board.task(task).ok_or(SessionError::UnknownTask(task))?;
        let patch = status_patch(record, status, &self.config.statuses);
        self.update_fields(task, patch)
    }

    pub fn set_priority(
        &mut self,
        task: TaskId,
        priority: Priority,
    ) -> Result<Option<RequestId>, SessionError> {
        let patch = TaskFields {
            priority: Some(priority),
            ..Default::default()
        };
        self.update_fields(task, patch)
    }

    pub fn set_due(
        &mut self,
        task: TaskId,
        due: Option<NaiveDate>,
    ) -> Result<Option<RequestId>, SessionError> {
        let patch = TaskFields {
            due: Some(due),
            ..Default::default()
        };
        self.update_fields(task, patch)
    }

    /// Add or remove one assignee
    pub fn toggle_assignee(
        &mut self,
        task: TaskId,
        user: UserId,
    ) -> Result<Option<RequestId>, SessionError> {
        let record = self.board.task(task).ok_or(SessionError::UnknownTask(task))?;
        let mut assignees: BTreeSet<UserId> = record.assignees.clone();
        if !assignees.remove(&user) {
            assignees.insert(user);
        }
        let patch = TaskFields {
            assignees: Some(assignees),
            ..Default::default()
        };
        self.update_fields(task, patch)
    }

    // ---------------------------------------------------------------------
    // Removal
    // ---------------------------------------------------------------------

    /// Delete a task. Temporary rows vanish locally; persisted tasks are
    /// removed optimistically and reinserted at their index on failure.
    pub fn delete_task(&mut self, task: TaskId) -> Result<Option<RequestId>, SessionError> {
        let mutation = plan_remove(&self.board, task)?;
        if task.is_temp() {
            if self.guard.is_busy(task) {
                tracing::debug!(%task, "delete rejected: create in flight");
                return Ok(None);
            }
            mutation.apply(&mut self.board)?;
            self.evict(task);
            return Ok(None);
        }
        let server_id = task.server().ok_or(SessionError::UnknownTask(task))?;
        let id = self.next_id();
        if !self.guard.try_acquire(task, id) {
            tracing::debug!(%task, "delete rejected: save in flight");
            return Ok(None);
        }
        mutation.apply(&mut self.board)?;
        if self.selected == Some(task) {
            self.selected = None;
        }
        self.ledger.record(id, mutation, 0);
        self.send_as(
            id,
            Request::DeleteTask { task: server_id },
            Inflight::Mutation {
                label: "delete task",
                tasks: vec![task],
                forget: vec![task],
            },
        );
        Ok(Some(id))
    }

    /// Delete several persisted tasks in one request. Tasks with a save in
    /// flight are skipped.
    pub fn bulk_delete(&mut self, tasks: &[TaskId]) -> Result<Option<RequestId>, SessionError> {
        let id = self.next_id();
        let claimed = self.claim(tasks, id);
        if claimed.is_empty() {
            return Ok(None);
        }
        let mutation = match plan_bulk_remove(&self.board, &claimed) {
            Ok(m) => m,
            Err(e) => {
                self.guard.release_request(id);
                return Err(e.into());
            }
        };
        mutation.apply(&mut self.board)?;
        if self.selected.is_some_and(|s| claimed.contains(&s)) {
            self.selected = None;
        }
        self.ledger.record(id, mutation, 0);
        let ids = claimed.iter().filter_map(|t| t.server()).collect();
        self.send_as(
            id,
            Request::BulkDelete { tasks: ids },
            Inflight::Mutation {
                label: "delete tasks",
                tasks: claimed.clone(),
                forget: claimed,
            },
        );
        Ok(Some(id))
    }

    /// Apply the same fields to several persisted tasks in one request
    pub fn bulk_update(
        &mut self,
        tasks: &[TaskId],
        patch: TaskFields,
    ) -> Result<Option<RequestId>, SessionError> {
        if patch.is_empty() {
            return Ok(None);
        }
        let id = self.next_id();
        let claimed = self.claim(tasks, id);
        if claimed.is_empty() {
            return Ok(None);
        }
        let mutation = match plan_bulk_patch(&self.board, &claimed, &patch) {
            Ok(m) => m,
            Err(e) => {
                self.guard.release_request(id);
                return Err(e.into());
            }
        };
        mutation.apply(&mut self.board)?;
        let stamp = self.clock.stamp_many(&claimed, &patch.fields());
        self.ledger.record(id, mutation, stamp);
        self.set_saving(&claimed, true);
        let ids = claimed.iter().filter_map(|t| t.server()).collect();
        self.send_as(
            id,
            Request::BulkUpdate {
                tasks: ids,
                fields: patch,
            },
            Inflight::BulkSave {
                tasks: claimed,
                stamp,
            },
        );
        Ok(Some(id))
    }

    /// Claim the guard for every persisted, idle task in `tasks`
    fn claim(&mut self, tasks: &[TaskId], id: RequestId) -> Vec<TaskId> {
        let mut claimed = Vec::new();
        for task in tasks {
            if task.is_temp() || !self.board.contains_task(*task) || claimed.contains(task) {
                continue;
            }
            if self.guard.try_acquire(*task, id) {
                claimed.push(*task);
            } else {
                tracing::debug!(%task, "bulk operation skipped task: save in flight");
            }
        }
        claimed
    }

    // ---------------------------------------------------------------------
    // Completions
    // ---------------------------------------------------------------------

    pub(super) fn on_mutation(
        &mut self,
        id: RequestId,
        label: &'static str,
        tasks: Vec<TaskId>,
        forget: Vec<TaskId>,
        result: Result<Reply, ApiError>,
        now: Instant,
    ) {
        self.guard.release_request(id);
        match result {
            Ok(_) => {
                self.ledger.confirm(id);
                for task in &forget {
                    self.rows.remove(*task);
                    self.clock.forget(*task);
                }
                self.set_saving(&tasks, false);
            }
            Err(e) => {
                if let Err(store) = self.ledger.rollback(id, &mut self.board, &self.clock) {
                    tracing::warn!(error = %store, "rollback could not be applied");
                }
                self.set_saving(&tasks, false);
                tracing::warn!(request = id.0, error = %e, "rolled back {}", label);
                self.notices.error(format!("Could not {}: {}", label, e), now);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn on_save(
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
        match result {
            Ok(server) => {
                self.ledger.confirm(id);
                self.adopt(task, &server, stamp);
                self.set_saving(&[task], false);
                if let Some(name) = &sent.name
                    && let Some(row) = self.rows.get_mut(task)
                {
                    match origin {
                        SaveOrigin::Submit => row.name.succeed(name),
                        _ => row.name.mark_saved(name),
                    }
                }
                if sent.status.is_some() {
                    self.recheck_filter(task);
                }
            }
            Err(e) => {
                if let Err(store) = self.ledger.rollback(id, &mut self.board, &self.clock) {
                    tracing::warn!(error = %store, "rollback could not be applied");
                }
                self.set_saving(&[task], false);
                if origin == SaveOrigin::Submit
                    && let Some(row) = self.rows.get_mut(task)
                {
                    row.name.fail();
                }
                self.notices
                    .error(format!("Could not save task {}: {}", task, e), now);
            }
        }
    }

    pub(super) fn on_bulk_save(
        &mut self,
        id: RequestId,
        tasks: Vec<TaskId>,
        stamp: u64,
        result: Result<Reply, ApiError>,
        now: Instant,
    ) {
        self.guard.release_request(id);
        let result = result.and_then(|reply| match reply {
            Reply::TaskList(list) => Ok(list),
            other => Err(unexpected(other)),
        });
        match result {
            Ok(list) => {
                let status_changed = self
                    .ledger
                    .confirm(id)
                    .is_some_and(|p| touches_status(&p.mutation));
                self.set_saving(&tasks, false);
                for server in list {
                    self.adopt(server.id, &server, stamp);
                    if status_changed {
                        self.recheck_filter(server.id);
                    }
                }
            }
            Err(e) => {
                if let Err(store) = self.ledger.rollback(id, &mut self.board, &self.clock) {
                    tracing::warn!(error = %store, "rollback could not be applied");
                }
                self.set_saving(&tasks, false);
                self.notices
                    .error(format!("Could not update tasks: {}", e), now);
            }
        }
    }

    /// After a confirmed status change: drop the task from the rendered
    /// list if the active status filter no longer admits it
    pub(super) fn recheck_filter(&mut self, task: TaskId) {
        if !self.filter.has_status_filter() {
            return;
        }
        let Some(record) = self.board.task(task) else {
            return;
        };
        if self.filter.status_admits(&record.status) {
            return;
        }
        tracing::debug!(%task, status = %record.status, "task left the status filter");
        if let Some(row) = self.rows.get_mut(task) {
            row.name.cancel();
        }
        self.evict(task);
    }

    /// Tasks of a section in display order (convenience for hosts)
    pub fn tasks_in(&self, section: SectionId) -> Vec<&Task> {
        self.board.section_tasks(section)
    }
}

fn touches_status(mutation: &Mutation) -> bool {
    match mutation {
        Mutation::Patch { patch, .. } => patch.status.is_some(),
        Mutation::Batch(items) => items.iter().any(touches_status),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::test_support::{loaded, names};
    use super::*;
    use crate::model::FilterState;
    use pretty_assertions::assert_eq;

    fn three_tasks() -> impl FnOnce(&crate::api::memory::MemoryRemote) {
        |remote| {
            let s = remote.seed_section("To Do");
            for name in ["a", "b", "c", "d"] {
                remote.seed_task(s, name, |_| {});
            }
            remote.seed_section("Done");
        }
    }

    #[test]
    fn reorder_success_moves_task_and_keeps_relative_order() {
        let (mut s, remote, now) = loaded(three_tasks());
        s.reorder_task(1, 0, 2).unwrap();
        assert_eq!(names(&s, 1), vec!["b", "c", "a", "d"]);
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["b", "c", "a", "d"]);
        assert_eq!(remote.task_order(1), vec![2, 3, 1, 4]);
        assert_eq!(s.unconfirmed(), 0);
        s.board().validate().unwrap();
    }

    #[test]
    fn reorder_failure_restores_exact_order() {
        let (mut s, remote, now) = loaded(three_tasks());
        remote.fail_on("reorder_tasks");
        s.reorder_task(1, 3, 0).unwrap();
        assert_eq!(names(&s, 1), vec!["d", "a", "b", "c"]);
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["a", "b", "c", "d"]);
        assert_eq!(
            s.notices().current().map(|n| n.level),
            Some(super::super::Level::Error)
        );
        s.board().validate().unwrap();
    }

    #[test]
    fn overlapping_reorder_in_same_section_is_rejected() {
        let (mut s, remote, now) = loaded(three_tasks());
        let first = s.reorder_task(1, 0, 3).unwrap();
        assert!(first.is_some());
        // b would carry a's unconfirmed position to the server
        assert_eq!(s.reorder_task(1, 0, 3).unwrap(), None);
        assert_eq!(names(&s, 1), vec!["b", "c", "d", "a"]);

        remote.fail_next(1);
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["a", "b", "c", "d"]);
        assert_eq!(remote.task_order(1), vec![1, 2, 3, 4]);
        assert_eq!(remote.call_count("reorder_tasks"), 1);

        // once the first resolves the section is free again
        assert!(s.reorder_task(1, 0, 3).unwrap().is_some());
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["b", "c", "d", "a"]);
        assert_eq!(remote.task_order(1), vec![2, 3, 4, 1]);
    }

    #[test]
    fn move_waits_for_reorder_in_either_section() {
        let (mut s, remote, now) = loaded(three_tasks());
        s.reorder_task(1, 3, 0).unwrap();
        assert_eq!(s.move_task(TaskId::Server(2), 2, 0).unwrap(), None);
        assert_eq!(names(&s, 2), Vec::<String>::new());
        s.drive(&remote, now);
        assert!(s.move_task(TaskId::Server(2), 2, 0).unwrap().is_some());
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["d", "a", "c"]);
        assert_eq!(names(&s, 2), vec!["b"]);
    }

    #[test]
    fn move_success_and_failure() {
        let (mut s, remote, now) = loaded(three_tasks());
        s.move_task(TaskId::Server(2), 2, 0).unwrap();
        assert_eq!(names(&s, 1), vec!["a", "c", "d"]);
        assert_eq!(names(&s, 2), vec!["b"]);
        s.drive(&remote, now);
        assert_eq!(remote.task_order(2), vec![2]);

        remote.fail_on("move_task");
        s.move_task(TaskId::Server(3), 2, 1).unwrap();
        assert_eq!(names(&s, 2), vec!["b", "c"]);
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["a", "c", "d"]);
        assert_eq!(names(&s, 2), vec!["b"]);
        s.board().validate().unwrap();
    }

    #[test]
    fn second_save_while_in_flight_is_rejected() {
        let (mut s, remote, now) = loaded(three_tasks());
        let first = s.set_priority(TaskId::Server(1), Priority::High).unwrap();
        assert!(first.is_some());
        let second = s.set_priority(TaskId::Server(1), Priority::Low).unwrap();
        assert_eq!(second, None);
        s.drive(&remote, now);
        assert_eq!(remote.call_count("update_task"), 1);
        assert_eq!(s.board().task(TaskId::Server(1)).unwrap().priority, Priority::High);
    }

    #[test]
    fn field_update_rolls_back_on_failure() {
        let (mut s, remote, now) = loaded(three_tasks());
        remote.fail_on("update_task");
        s.set_due(TaskId::Server(1), NaiveDate::from_ymd_opt(2025, 3, 1))
            .unwrap();
        assert!(s.board().task(TaskId::Server(1)).unwrap().due.is_some());
        s.drive(&remote, now + Duration::from_millis(10));
        assert_eq!(s.board().task(TaskId::Server(1)).unwrap().due, None);
        assert!(!s.is_saving(TaskId::Server(1)));
    }

    #[test]
    fn status_filter_recheck_after_toggle() {
        let (mut s, remote, now) = loaded(|remote| {
            let sec = remote.seed_section("All");
            remote.seed_task(sec, "open", |_| {});
            remote.seed_task(sec, "done", |t| {
                t.status = "completed".into();
                t.completed = true;
            });
        });
        let mut filter = FilterState::default();
        filter.toggle_status("Completed");
        s.set_filter(filter);
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["done"]);

        // completed -> pending leaves the filter
        s.toggle_complete(TaskId::Server(2)).unwrap();
        assert_eq!(names(&s, 1), vec!["done"]);
        s.drive(&remote, now);
        assert!(names(&s, 1).is_empty());
        assert_eq!(remote.call_count("list_tasks"), 2);
    }

    #[test]
    fn toggle_into_filter_keeps_task_visible() {
        let (mut s, remote, now) = loaded(|remote| {
            let sec = remote.seed_section("All");
            remote.seed_task(sec, "open", |_| {});
        });
        // The filter admits both states, so the row stays after completion
        let mut filter = FilterState::default();
        filter.toggle_status("pending");
        filter.toggle_status("completed");
        s.set_filter(filter);
        s.drive(&remote, now);
        s.toggle_complete(TaskId::Server(1)).unwrap();
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["open"]);
        assert!(s.board().task(TaskId::Server(1)).unwrap().completed);
    }

    #[test]
    fn delete_failure_reinserts_at_original_index() {
        let (mut s, remote, now) = loaded(three_tasks());
        remote.fail_on("delete_task");
        s.delete_task(TaskId::Server(3)).unwrap();
        assert_eq!(names(&s, 1), vec!["a", "b", "d"]);
        s.drive(&remote, now);
        assert_eq!(names(&s, 1), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn bulk_update_and_delete() {
        let (mut s, remote, now) = loaded(three_tasks());
        let ids = [TaskId::Server(1), TaskId::Server(4)];
        s.bulk_update(
            &ids,
            TaskFields {
                priority: Some(Priority::Low),
                ..Default::default()
            },
        )
        .unwrap();
        s.drive(&remote, now);
        assert_eq!(remote.task(4).unwrap().priority, Priority::Low);

        s.bulk_delete(&ids).unwrap();
        assert_eq!(names(&s, 1), vec!["b", "c"]);
        s.drive(&remote, now);
        assert_eq!(remote.task_order(1), vec![2, 3]);
        assert!(s.rows().get(TaskId::Server(1)).is_none());
    }
}
