use crate::model::{Section, SectionId, Task, TaskFields, TaskId};
use crate::store::{Board, StoreError};

/// A change to the board cache, applied before the server confirms it.
///
/// Every variant carries what it needs to build its own inverse, so a
/// failed request can be undone without consulting the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Task moved within its section
    Reorder {
        section: SectionId,
        task: TaskId,
        from: usize,
        to: usize,
    },
    /// Task moved to another section
    Move {
        task: TaskId,
        from_section: SectionId,
        from_index: usize,
        to_section: SectionId,
        to_index: usize,
    },
    /// Field values changed; `inverse` holds the previous values
    Patch {
        task: TaskId,
        patch: TaskFields,
        inverse: TaskFields,
    },
    /// Task removed from the board
    Remove {
        section: SectionId,
        index: usize,
        task: Box<Task>,
    },
    /// Task inserted into the board
    Insert {
        section: SectionId,
        index: usize,
        task: Box<Task>,
    },
    /// Section moved in the section list
    ReorderSection {
        section: SectionId,
        from: usize,
        to: usize,
    },
    RenameSection {
        section: SectionId,
        old_name: String,
        new_name: String,
    },
    /// Section removed together with the tasks it still owned
    RemoveSection {
        index: usize,
        section: Box<Section>,
        tasks: Vec<Task>,
    },
    InsertSection {
        index: usize,
        section: Box<Section>,
        tasks: Vec<Task>,
    },
    /// Several mutations applied and reverted as one
    Batch(Vec<Mutation>),
}

impl Mutation {
    /// Apply this mutation to the board
    pub fn apply(&self, board: &mut Board) -> Result<(), StoreError> {
        match self {
            Mutation::Reorder { task, to, .. } => {
                board.shift_task(*task, *to)?;
            }
            Mutation::Move {
                task,
                to_section,
                to_index,
                ..
            } => {
                if board.section(*to_section).is_none() {
                    return Err(StoreError::UnknownSection(*to_section));
                }
                let (_, _, record) = board.detach_task(*task)?;
                let len = board.section(*to_section).map_or(0, |s| s.tasks.len());
                board.attach_task(*to_section, (*to_index).min(len), record)?;
            }
            Mutation::Patch { task, patch, .. } => {
                let record = board
                    .task_mut(*task)
                    .ok_or(StoreError::UnknownTask(*task))?;
                patch.apply_to(record);
            }
            Mutation::Remove { task, .. } => {
                board.detach_task(task.id)?;
            }
            Mutation::Insert {
                section,
                index,
                task,
            } => {
                let len = board.section(*section).map_or(0, |s| s.tasks.len());
                board.attach_task(*section, (*index).min(len), (**task).clone())?;
            }
            Mutation::ReorderSection { section, to, .. } => {
                board.move_section(*section, *to)?;
            }
            Mutation::RenameSection {
                section, new_name, ..
            } => {
                let sec = board
                    .section_mut(*section)
                    .ok_or(StoreError::UnknownSection(*section))?;
                sec.name = new_name.clone();
            }
            Mutation::RemoveSection { section, .. } => {
                board.remove_section(section.id)?;
            }
            Mutation::InsertSection {
                index,
                section,
                tasks,
            } => {
                let mut shell = (**section).clone();
                let order = std::mem::take(&mut shell.tasks);
                board.insert_section(shell, *index);
                for (i, id) in order.iter().enumerate() {
                    if let Some(task) = tasks.iter().find(|t| t.id == *id) {
                        board.attach_task(section.id, i, task.clone())?;
                    }
                }
            }
            Mutation::Batch(items) => {
                for m in items {
                    m.apply(board)?;
                }
            }
        }
        Ok(())
    }

    /// The mutation that undoes this one
    pub fn inverse(&self) -> Mutation {
        match self {
            Mutation::Reorder {
                section,
                task,
                from,
                to,
            } => Mutation::Reorder {
                section: *section,
                task: *task,
                from: *to,
                to: *from,
            },
            Mutation::Move {
                task,
                from_section,
                from_index,
                to_section,
                to_index,
            } => Mutation::Move {
                task: *task,
                from_section: *to_section,
                from_index: *to_index,
                to_section: *from_section,
                to_index: *from_index,
            },
            Mutation::Patch {
                task,
                patch,
                inverse,
            } => Mutation::Patch {
                task: *task,
                patch: inverse.clone(),
                inverse: patch.clone(),
            },
            Mutation::Remove {
                section,
                index,
                task,
            } => Mutation::Insert {
                section: *section,
                index: *index,
                task: task.clone(),
            },
            Mutation::Insert {
                section,
                index,
                task,
            } => Mutation::Remove {
                section: *section,
                index: *index,
                task: task.clone(),
            },
            Mutation::ReorderSection { section, from, to } => Mutation::ReorderSection {
                section: *section,
                from: *to,
                to: *from,
            },
            Mutation::RenameSection {
                section,
                old_name,
                new_name,
            } => Mutation::RenameSection {
                section: *section,
                old_name: new_name.clone(),
                new_name: old_name.clone(),
            },
            Mutation::RemoveSection {
                index,
                section,
                tasks,
            } => Mutation::InsertSection {
                index: *index,
                section: section.clone(),
                tasks: tasks.clone(),
            },
            Mutation::InsertSection {
                index,
                section,
                tasks,
            } => Mutation::RemoveSection {
                index: *index,
                section: section.clone(),
                tasks: tasks.clone(),
            },
            Mutation::Batch(items) => Mutation::Batch(items.iter().rev().map(Self::inverse).collect()),
        }
    }

    /// Tasks this mutation touches (used by the per-task guard)
    pub fn tasks(&self) -> Vec<TaskId> {
        match self {
            Mutation::Reorder { task, .. }
            | Mutation::Move { task, .. }
            | Mutation::Patch { task, .. } => vec![*task],
            Mutation::Remove { task, .. } | Mutation::Insert { task, .. } => vec![task.id],
            Mutation::RemoveSection { tasks, .. } | Mutation::InsertSection { tasks, .. } => {
                tasks.iter().map(|t| t.id).collect()
            }
            Mutation::ReorderSection { .. } | Mutation::RenameSection { .. } => Vec::new(),
            Mutation::Batch(items) => items.iter().flat_map(Self::tasks).collect(),
        }
    }

    /// Human-readable label used in notifications
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Reorder { .. } => "reorder",
            Mutation::Move { .. } => "move",
            Mutation::Patch { .. } => "update",
            Mutation::Remove { .. } => "delete",
            Mutation::Insert { .. } => "insert",
            Mutation::ReorderSection { .. } => "section reorder",
            Mutation::RenameSection { .. } => "section rename",
            Mutation::RemoveSection { .. } => "section delete",
            Mutation::InsertSection { .. } => "section insert",
            Mutation::Batch(items) => items.first().map_or("batch", Self::label),
        }
    }

    /// Rewrite references to a temporary id after the server issued one
    pub fn rekey(&mut self, from: TaskId, to: TaskId) {
        let swap = |id: &mut TaskId| {
            if *id == from {
                *id = to;
            }
        };
        match self {
            Mutation::Reorder { task, .. }
            | Mutation::Move { task, .. }
            | Mutation::Patch { task, .. } => swap(task),
            Mutation::Remove { task, .. } | Mutation::Insert { task, .. } => swap(&mut task.id),
            Mutation::RemoveSection { section, tasks, .. }
            | Mutation::InsertSection { section, tasks, .. } => {
                section.tasks.iter_mut().for_each(swap);
                tasks.iter_mut().for_each(|t| swap(&mut t.id));
            }
            Mutation::ReorderSection { .. } | Mutation::RenameSection { .. } => {}
            Mutation::Batch(items) => items.iter_mut().for_each(|m| m.rekey(from, to)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::store::test_support::{board, order};
    use pretty_assertions::assert_eq;

    fn ids(ns: &[u64]) -> Vec<TaskId> {
        ns.iter().map(|n| TaskId::Server(*n)).collect()
    }

    #[test]
    fn reorder_and_inverse_restore_order() {
        let mut b = board(&[(1, 5)]);
        let before = order(&b, 1);
        let m = Mutation::Reorder {
            section: 1,
            task: TaskId::Server(2),
            from: 1,
            to: 3,
        };
        m.apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), ids(&[1, 3, 4, 2, 5]));
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), before);
        b.validate().unwrap();
    }

    #[test]
    fn move_and_inverse_restore_both_sections() {
        let mut b = board(&[(1, 3), (2, 2)]);
        let m = Mutation::Move {
            task: TaskId::Server(1),
            from_section: 1,
            from_index: 0,
            to_section: 2,
            to_index: 1,
        };
        m.apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), ids(&[2, 3]));
        assert_eq!(order(&b, 2), ids(&[4, 1, 5]));
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), ids(&[1, 2, 3]));
        assert_eq!(order(&b, 2), ids(&[4, 5]));
        b.validate().unwrap();
    }

    #[test]
    fn patch_inverse_restores_fields() {
        let mut b = board(&[(1, 1)]);
        let id = TaskId::Server(1);
        let patch = TaskFields {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let inverse = patch.clone().apply_to(&mut b.task(id).cloned().unwrap());
        let m = Mutation::Patch {
            task: id,
            patch,
            inverse,
        };
        m.apply(&mut b).unwrap();
        assert_eq!(b.task(id).map(|t| t.priority), Some(Priority::High));
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(b.task(id).map(|t| t.priority), Some(Priority::Medium));
    }

    #[test]
    fn remove_section_round_trip() {
        let mut b = board(&[(1, 2), (2, 1)]);
        let (index, section, tasks) = b.clone().remove_section(1).unwrap();
        let m = Mutation::RemoveSection {
            index,
            section: Box::new(section),
            tasks,
        };
        m.apply(&mut b).unwrap();
        assert!(b.section(1).is_none());
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(b.section_ids(), vec![1, 2]);
        assert_eq!(order(&b, 1), ids(&[1, 2]));
        b.validate().unwrap();
    }

    #[test]
    fn batch_inverse_runs_in_reverse() {
        let mut b = board(&[(1, 3)]);
        let m = Mutation::Batch(vec![
            Mutation::Reorder {
                section: 1,
                task: TaskId::Server(1),
                from: 0,
                to: 2,
            },
            Mutation::Reorder {
                section: 1,
                task: TaskId::Server(2),
                from: 0,
                to: 1,
            },
        ]);
        m.apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), ids(&[3, 2, 1]));
        m.inverse().apply(&mut b).unwrap();
        assert_eq!(order(&b, 1), ids(&[1, 2, 3]));
        assert_eq!(m.tasks(), ids(&[1, 2]));
    }
}
