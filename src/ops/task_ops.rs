use crate::model::{SectionId, StatusCatalog, Task, TaskFields, TaskId};
use crate::optimistic::Mutation;
use crate::store::Board;

/// Error type for task and section operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("section not found: {0}")]
    SectionNotFound(SectionId),
    #[error("invalid position: {0}")]
    InvalidPosition(String),
    #[error("no section left to receive the tasks")]
    NoTargetSection,
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Plan a move within one section. `None` when the drop lands where the
/// task already is.
pub fn plan_reorder(
    board: &Board,
    section: SectionId,
    from: usize,
    to: usize,
) -> Result<Option<Mutation>, OpError> {
    let sec = board
        .section(section)
        .ok_or(OpError::SectionNotFound(section))?;
    let len = sec.tasks.len();
    let task = *sec
        .tasks
        .get(from)
        .ok_or_else(|| OpError::InvalidPosition(format!("source index {} of {}", from, len)))?;
    if to >= len {
        return Err(OpError::InvalidPosition(format!(
            "destination index {} of {}",
            to, len
        )));
    }
    if from == to {
        return Ok(None);
    }
    Ok(Some(Mutation::Reorder {
        section,
        task,
        from,
        to,
    }))
}

/// Plan a move of `task` into another section at `to_index` (clamped to
/// the destination length)
pub fn plan_move(
    board: &Board,
    task: TaskId,
    to_section: SectionId,
    to_index: usize,
) -> Result<Mutation, OpError> {
    let (from_section, from_index) = board.locate(task).ok_or(OpError::TaskNotFound(task))?;
    let dest = board
        .section(to_section)
        .ok_or(OpError::SectionNotFound(to_section))?;
    if from_section == to_section {
        return Err(OpError::InvalidPosition(
            "destination is the owning section".into(),
        ));
    }
    Ok(Mutation::Move {
        task,
        from_section,
        from_index,
        to_section,
        to_index: to_index.min(dest.tasks.len()),
    })
}

/// Server ids of a section in display order. Temporary rows are left out:
/// the server does not know them yet.
pub fn persisted_order(board: &Board, section: SectionId) -> Vec<u64> {
    board
        .section(section)
        .map(|s| s.tasks.iter().filter_map(|t| t.server()).collect())
        .unwrap_or_default()
}

/// Translate a display index into the index the server sees, skipping
/// temporary rows ahead of it
pub fn server_index(board: &Board, section: SectionId, index: usize) -> usize {
    board.section(section).map_or(0, |s| {
        s.tasks
            .iter()
            .take(index)
            .filter(|t| !t.is_temp())
            .count()
    })
}

// ---------------------------------------------------------------------------
// Field changes
// ---------------------------------------------------------------------------

/// Build a patch mutation against the current task record. The inverse holds
/// the record's present values of the patched fields.
pub fn plan_patch(board: &Board, task: TaskId, patch: TaskFields) -> Result<Mutation, OpError> {
    let record = board.task(task).ok_or(OpError::TaskNotFound(task))?;
    let mut scratch = record.clone();
    let inverse = patch.apply_to(&mut scratch);
    Ok(Mutation::Patch {
        task,
        patch,
        inverse,
    })
}

/// Completion toggle: done ↔ the catalog's default status
pub fn completion_patch(task: &Task, catalog: &StatusCatalog) -> TaskFields {
    let completing = !task.completed;
    let status = if completing {
        catalog.done_key()
    } else {
        catalog.default_key()
    };
    TaskFields {
        completed: Some(completing),
        status: Some(status.to_string()),
        ..Default::default()
    }
}

/// Status change; keeps the completion flag in step with the done status
pub fn status_patch(task: &Task, status: &str, catalog: &StatusCatalog) -> TaskFields {
    let key = catalog
        .get(status)
        .map_or_else(|| status.to_string(), |s| s.key.clone());
    let done = catalog.is_done(&key);
    let mut patch = TaskFields {
        status: Some(key),
        ..Default::default()
    };
    if done != task.completed {
        patch.completed = Some(done);
    }
    patch
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

pub fn plan_remove(board: &Board, task: TaskId) -> Result<Mutation, OpError> {
    let (section, index) = board.locate(task).ok_or(OpError::TaskNotFound(task))?;
    let record = board.task(task).ok_or(OpError::TaskNotFound(task))?;
    Ok(Mutation::Remove {
        section,
        index,
        task: Box::new(record.clone()),
    })
}

/// Remove several tasks as one batch. Each removal records the index the
/// task has once the earlier removals are applied, so the inverse restores
/// every slot exactly.
pub fn plan_bulk_remove(board: &Board, tasks: &[TaskId]) -> Result<Mutation, OpError> {
    let mut scratch = board.clone();
    let mut items = Vec::with_capacity(tasks.len());
    for id in tasks {
        let m = plan_remove(&scratch, *id)?;
        m.apply(&mut scratch)
            .map_err(|_| OpError::TaskNotFound(*id))?;
        items.push(m);
    }
    Ok(Mutation::Batch(items))
}

pub fn plan_bulk_patch(
    board: &Board,
    tasks: &[TaskId],
    patch: &TaskFields,
) -> Result<Mutation, OpError> {
    let items = tasks
        .iter()
        .map(|id| plan_patch(board, *id, patch.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Mutation::Batch(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::store::test_support::{board, order};
    use pretty_assertions::assert_eq;

    #[test]
    fn reorder_to_same_slot_is_a_noop() {
        let b = board(&[(1, 3)]);
        assert_eq!(plan_reorder(&b, 1, 1, 1), Ok(None));
        assert!(plan_reorder(&b, 1, 0, 3).is_err());
        assert!(plan_reorder(&b, 9, 0, 1).is_err());
    }

    #[test]
    fn move_clamps_destination() {
        let b = board(&[(1, 2), (2, 1)]);
        let m = plan_move(&b, TaskId::Server(1), 2, 10).unwrap();
        assert_eq!(
            m,
            Mutation::Move {
                task: TaskId::Server(1),
                from_section: 1,
                from_index: 0,
                to_section: 2,
                to_index: 1,
            }
        );
        assert!(plan_move(&b, TaskId::Server(1), 1, 0).is_err());
    }

    #[test]
    fn persisted_order_skips_temp_rows() {
        let mut b = board(&[(1, 2)]);
        b.attach_task(1, 1, Task::temporary(TaskId::Temp(1), "pending"))
            .unwrap();
        assert_eq!(persisted_order(&b, 1), vec![1, 2]);
        assert_eq!(server_index(&b, 1, 2), 1);
        assert_eq!(server_index(&b, 1, 3), 2);
    }

    #[test]
    fn completion_toggle_tracks_done_status() {
        let catalog = StatusCatalog::default();
        let mut task = Task::temporary(TaskId::Server(1), "pending");
        let patch = completion_patch(&task, &catalog);
        assert_eq!(patch.completed, Some(true));
        assert_eq!(patch.status.as_deref(), Some("completed"));
        patch.apply_to(&mut task);
        let reopen = completion_patch(&task, &catalog);
        assert_eq!(reopen.status.as_deref(), Some("pending"));
        assert_eq!(reopen.completed, Some(false));
    }

    #[test]
    fn status_patch_sets_completion_when_needed() {
        let catalog = StatusCatalog::default();
        let task = Task::temporary(TaskId::Server(1), "pending");
        let done = status_patch(&task, "Completed", &catalog);
        assert_eq!(done.status.as_deref(), Some("completed"));
        assert_eq!(done.completed, Some(true));
        let progress = status_patch(&task, "in_progress", &catalog);
        assert_eq!(progress.completed, None);
    }

    #[test]
    fn bulk_remove_restores_every_slot() {
        let mut b = board(&[(1, 5)]);
        let before = order(&b, 1);
        let m = plan_bulk_remove(&b, &[TaskId::Server(2), TaskId::Server(4)]).unwrap();
        m.apply(&mut b).unwrap();
        assert_eq!(
            order(&b, 1),
            vec![TaskId::Server(1), TaskId::Server(3), TaskId::Server(5)]
        );
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), before);
        b.validate().unwrap();
    }

    #[test]
    fn bulk_patch_inverse_restores_each_task() {
        let mut b = board(&[(1, 2)]);
        b.task_mut(TaskId::Server(2)).unwrap().priority = Priority::Low;
        let patch = TaskFields {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let m = plan_bulk_patch(&b, &[TaskId::Server(1), TaskId::Server(2)], &patch).unwrap();
        m.apply(&mut b).unwrap();
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(b.task(TaskId::Server(1)).unwrap().priority, Priority::Medium);
        assert_eq!(b.task(TaskId::Server(2)).unwrap().priority, Priority::Low);
    }
}
