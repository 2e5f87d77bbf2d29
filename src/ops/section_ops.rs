use crate::model::{DeleteMode, SectionId};
use crate::optimistic::Mutation;
use crate::store::Board;

use super::task_ops::OpError;

/// Plan a move of a section in the section list
pub fn plan_section_reorder(
    board: &Board,
    section: SectionId,
    to: usize,
) -> Result<Option<Mutation>, OpError> {
    let from = board
        .section_index(section)
        .ok_or(OpError::SectionNotFound(section))?;
    let len = board.section_count();
    if to >= len {
        return Err(OpError::InvalidPosition(format!(
            "section index {} of {}",
            to, len
        )));
    }
    if from == to {
        return Ok(None);
    }
    Ok(Some(Mutation::ReorderSection { section, from, to }))
}

pub fn plan_section_rename(
    board: &Board,
    section: SectionId,
    name: &str,
) -> Result<Option<Mutation>, OpError> {
    let sec = board
        .section(section)
        .ok_or(OpError::SectionNotFound(section))?;
    if sec.name == name {
        return Ok(None);
    }
    Ok(Some(Mutation::RenameSection {
        section,
        old_name: sec.name.clone(),
        new_name: name.to_string(),
    }))
}

/// Plan a section delete.
///
/// `WithTasks` drops the section and everything in it. `SectionOnly` first
/// appends the section's tasks, in order, to the first remaining section.
/// Returns the receiving section alongside the mutation.
pub fn plan_section_delete(
    board: &Board,
    section: SectionId,
    mode: DeleteMode,
) -> Result<(Mutation, Option<SectionId>), OpError> {
    let index = board
        .section_index(section)
        .ok_or(OpError::SectionNotFound(section))?;
    let sec = board
        .section(section)
        .ok_or(OpError::SectionNotFound(section))?;

    match mode {
        DeleteMode::WithTasks => {
            let tasks = sec
                .tasks
                .iter()
                .filter_map(|id| board.task(*id).cloned())
                .collect();
            let m = Mutation::RemoveSection {
                index,
                section: Box::new(sec.clone()),
                tasks,
            };
            Ok((m, None))
        }
        DeleteMode::SectionOnly => {
            let target = board
                .sections()
                .map(|s| s.id)
                .find(|id| *id != section)
                .ok_or(OpError::NoTargetSection)?;
            let base = board.section(target).map_or(0, |s| s.tasks.len());
            let mut items: Vec<Mutation> = sec
                .tasks
                .iter()
                .enumerate()
                .map(|(i, task)| Mutation::Move {
                    task: *task,
                    from_section: section,
                    from_index: 0,
                    to_section: target,
                    to_index: base + i,
                })
                .collect();
            let mut shell = sec.clone();
            shell.tasks.clear();
            items.push(Mutation::RemoveSection {
                index,
                section: Box::new(shell),
                tasks: Vec::new(),
            });
            Ok((Mutation::Batch(items), Some(target)))
        }
    }
}
