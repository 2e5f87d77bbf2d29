//! Normalized client-side cache of sections and tasks.
//!
//! Sections are kept in display order; each holds the ordered ids of the
//! tasks it owns. Task records live in a single table, and an owner index
//! guarantees that exactly one section owns any task.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::{Section, SectionId, Task, TaskId};

/// Error type for cache operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("section not found: {0}")]
    UnknownSection(SectionId),
    #[error("task not found: {0}")]
    UnknownTask(TaskId),
    #[error("task {0} is already in the board")]
    DuplicateTask(TaskId),
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// The board cache
#[derive(Debug, Clone, Default)]
pub struct Board {
    sections: IndexMap<SectionId, Section>,
    tasks: HashMap<TaskId, Task>,
    owners: HashMap<TaskId, SectionId>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Sections ---

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn section_ids(&self) -> Vec<SectionId> {
        self.sections.keys().copied().collect()
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(&id)
    }

    pub fn section_mut(&mut self, id: SectionId) -> Option<&mut Section> {
        self.sections.get_mut(&id)
    }

    pub fn section_index(&self, id: SectionId) -> Option<usize> {
        self.sections.get_index_of(&id)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Insert a section at `index` (clamped). Its task list must be empty or
    /// refer only to tasks already attached via [`Board::attach_task`].
    pub fn insert_section(&mut self, mut section: Section, index: usize) {
        let id = section.id;
        section.tasks.retain(|t| self.owners.get(t) == Some(&id));
        let index = index.min(self.sections.len());
        self.sections.insert(id, section);
        let last = self.sections.len() - 1;
        self.sections.move_index(last, index);
        self.rerank_sections();
    }

    /// Insert or refresh a section from a server listing, keeping the
    /// client-side task list and paging state of an existing entry
    pub fn upsert_section(&mut self, incoming: Section) {
        match self.sections.get_mut(&incoming.id) {
            Some(existing) => {
                existing.name = incoming.name;
            }
            None => {
                let at = self.sections.len();
                self.insert_section(incoming, at);
            }
        }
    }

    /// Remove a section and every task it owns
    pub fn remove_section(&mut self, id: SectionId) -> Result<(usize, Section, Vec<Task>), StoreError> {
        let (index, _, section) = self
            .sections
            .shift_remove_full(&id)
            .ok_or(StoreError::UnknownSection(id))?;
        let mut tasks = Vec::with_capacity(section.tasks.len());
        for task_id in &section.tasks {
            self.owners.remove(task_id);
            if let Some(task) = self.tasks.remove(task_id) {
                tasks.push(task);
            }
        }
        self.rerank_sections();
        Ok((index, section, tasks))
    }

    /// Move a section to a new display index; returns the old index
    pub fn move_section(&mut self, id: SectionId, to: usize) -> Result<usize, StoreError> {
        let from = self
            .sections
            .get_index_of(&id)
            .ok_or(StoreError::UnknownSection(id))?;
        let len = self.sections.len();
        if to >= len {
            return Err(StoreError::IndexOutOfRange { index: to, len });
        }
        self.sections.move_index(from, to);
        self.rerank_sections();
        Ok(from)
    }

    fn rerank_sections(&mut self) {
        for (i, section) in self.sections.values_mut().enumerate() {
            section.position = i as u32;
        }
    }

    // --- Tasks ---

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn contains_task(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// The section that owns a task
    pub fn owner(&self, id: TaskId) -> Option<SectionId> {
        self.owners.get(&id).copied()
    }

    /// Section and index of a task
    pub fn locate(&self, id: TaskId) -> Option<(SectionId, usize)> {
        let section = self.owner(id)?;
        let index = self.sections.get(&section)?.index_of(id)?;
        Some((section, index))
    }

    /// Tasks of a section in display order
    pub fn section_tasks(&self, id: SectionId) -> Vec<&Task> {
        self.sections
            .get(&id)
            .map(|s| s.tasks.iter().filter_map(|t| self.tasks.get(t)).collect())
            .unwrap_or_default()
    }

    /// Insert a task into a section at `index` (must be `<= len`)
    pub fn attach_task(
        &mut self,
        section: SectionId,
        index: usize,
        task: Task,
    ) -> Result<(), StoreError> {
        if self.tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateTask(task.id));
        }
        let sec = self
            .sections
            .get_mut(&section)
            .ok_or(StoreError::UnknownSection(section))?;
        let len = sec.tasks.len();
        if index > len {
            return Err(StoreError::IndexOutOfRange { index, len });
        }
        let id = task.id;
        sec.tasks.insert(index, id);
        self.tasks.insert(id, task);
        self.owners.insert(id, section);
        self.rerank(section);
        Ok(())
    }

    /// Remove a task from its section; returns where it was
    pub fn detach_task(&mut self, id: TaskId) -> Result<(SectionId, usize, Task), StoreError> {
        let (section, index) = self.locate(id).ok_or(StoreError::UnknownTask(id))?;
        if let Some(sec) = self.sections.get_mut(&section) {
            sec.tasks.remove(index);
        }
        self.owners.remove(&id);
        let task = self.tasks.remove(&id).ok_or(StoreError::UnknownTask(id))?;
        self.rerank(section);
        Ok((section, index, task))
    }

    /// Move a task within its own section to `to` (must be `< len`)
    pub fn shift_task(&mut self, id: TaskId, to: usize) -> Result<usize, StoreError> {
        let (section, from) = self.locate(id).ok_or(StoreError::UnknownTask(id))?;
        let sec = self
            .sections
            .get_mut(&section)
            .ok_or(StoreError::UnknownSection(section))?;
        let len = sec.tasks.len();
        if to >= len {
            return Err(StoreError::IndexOutOfRange { index: to, len });
        }
        let moved = sec.tasks.remove(from);
        sec.tasks.insert(to, moved);
        self.rerank(section);
        Ok(from)
    }

    /// Append a fetched page to a section, skipping tasks already cached
    /// (a task can be both fetched and locally inserted when pages shift)
    pub fn append_page(&mut self, section: SectionId, tasks: Vec<Task>) -> Result<usize, StoreError> {
        if !self.sections.contains_key(&section) {
            return Err(StoreError::UnknownSection(section));
        }
        let mut added = 0;
        for task in tasks {
            if self.tasks.contains_key(&task.id) {
                continue;
            }
            let len = self.sections.get(&section).map_or(0, |s| s.tasks.len());
            self.attach_task(section, len, task)?;
            added += 1;
        }
        Ok(added)
    }

    /// Drop every cached task of a section except the ones `keep` selects
    pub fn clear_section_tasks(
        &mut self,
        section: SectionId,
        keep: impl Fn(&Task) -> bool,
    ) -> Result<Vec<TaskId>, StoreError> {
        let ids = self
            .sections
            .get(&section)
            .ok_or(StoreError::UnknownSection(section))?
            .tasks
            .clone();
        let mut dropped = Vec::new();
        for id in ids {
            let keep_it = self.tasks.get(&id).is_some_and(&keep);
            if !keep_it {
                self.detach_task(id)?;
                dropped.push(id);
            }
        }
        Ok(dropped)
    }

    /// Swap a temporary id for the server id in place: same section, same
    /// index, same record
    pub fn rekey_task(&mut self, from: TaskId, to: TaskId) -> Result<(), StoreError> {
        if self.tasks.contains_key(&to) {
            return Err(StoreError::DuplicateTask(to));
        }
        let (section, index) = self.locate(from).ok_or(StoreError::UnknownTask(from))?;
        let mut task = self.tasks.remove(&from).ok_or(StoreError::UnknownTask(from))?;
        task.id = to;
        self.tasks.insert(to, task);
        self.owners.remove(&from);
        self.owners.insert(to, section);
        if let Some(sec) = self.sections.get_mut(&section) {
            sec.tasks[index] = to;
        }
        Ok(())
    }

    /// Keep ordinal positions dense and unique
    fn rerank(&mut self, section: SectionId) {
        let Some(sec) = self.sections.get(&section) else {
            return;
        };
        for (i, id) in sec.tasks.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(id) {
                task.position = i as u32;
            }
        }
    }

    /// Check the cache invariants: single ownership, no duplicate ranks,
    /// dense positions
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashMap::new();
        for section in self.sections.values() {
            for (i, id) in section.tasks.iter().enumerate() {
                if let Some(other) = seen.insert(*id, section.id) {
                    return Err(format!(
                        "task {} owned by sections {} and {}",
                        id, other, section.id
                    ));
                }
                if self.owners.get(id) != Some(&section.id) {
                    return Err(format!("owner index out of sync for task {}", id));
                }
                match self.tasks.get(id) {
                    Some(t) if t.position == i as u32 => {}
                    Some(t) => {
                        return Err(format!(
                            "task {} has position {} at index {}",
                            id, t.position, i
                        ));
                    }
                    None => return Err(format!("task {} missing from table", id)),
                }
            }
        }
        if seen.len() != self.tasks.len() {
            return Err("task table has unowned entries".into());
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A board with the given sections, each filled with server tasks named
    /// `<section>-<n>`; ids are assigned sequentially from 1
    pub fn board(layout: &[(SectionId, usize)]) -> Board {
        let mut board = Board::new();
        let mut next = 1;
        for (i, (sid, count)) in layout.iter().enumerate() {
            board.insert_section(Section::new(*sid, format!("S{}", sid)), i);
            for n in 0..*count {
                let mut task = Task::temporary(TaskId::Server(next), "pending");
                task.name = format!("{}-{}", sid, n);
                task.initial = false;
                board.attach_task(*sid, n, task).unwrap();
                next += 1;
            }
        }
        board
    }

    pub fn order(board: &Board, section: SectionId) -> Vec<TaskId> {
        board.section(section).map(|s| s.tasks.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attach_and_detach_keep_positions_dense() {
        let mut b = board(&[(1, 3)]);
        let (section, index, task) = b.detach_task(TaskId::Server(2)).unwrap();
        assert_eq!((section, index), (1, 1));
        assert_eq!(order(&b, 1), vec![TaskId::Server(1), TaskId::Server(3)]);
        b.validate().unwrap();
        b.attach_task(1, 0, task).unwrap();
        assert_eq!(
            order(&b, 1),
            vec![TaskId::Server(2), TaskId::Server(1), TaskId::Server(3)]
        );
        b.validate().unwrap();
    }

    #[test]
    fn duplicate_attach_is_rejected() {
        let mut b = board(&[(1, 1), (2, 0)]);
        let dup = b.task(TaskId::Server(1)).cloned().unwrap();
        assert_eq!(
            b.attach_task(2, 0, dup),
            Err(StoreError::DuplicateTask(TaskId::Server(1)))
        );
    }

    #[test]
    fn shift_rejects_out_of_range() {
        let mut b = board(&[(1, 2)]);
        assert_eq!(
            b.shift_task(TaskId::Server(1), 2),
            Err(StoreError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn rekey_keeps_slot() {
        let mut b = board(&[(1, 2)]);
        let mut temp = Task::temporary(TaskId::Temp(1), "pending");
        temp.name = "new".into();
        b.attach_task(1, 1, temp).unwrap();
        b.rekey_task(TaskId::Temp(1), TaskId::Server(99)).unwrap();
        assert_eq!(
            order(&b, 1),
            vec![TaskId::Server(1), TaskId::Server(99), TaskId::Server(2)]
        );
        assert_eq!(b.owner(TaskId::Server(99)), Some(1));
        assert!(b.task(TaskId::Temp(1)).is_none());
        b.validate().unwrap();
    }

    #[test]
    fn remove_section_takes_its_tasks() {
        let mut b = board(&[(1, 2), (2, 1)]);
        let (index, section, tasks) = b.remove_section(1).unwrap();
        assert_eq!(index, 0);
        assert_eq!(section.id, 1);
        assert_eq!(tasks.len(), 2);
        assert_eq!(b.task_count(), 1);
        assert_eq!(b.section(2).map(|s| s.position), Some(0));
        b.validate().unwrap();
    }

    #[test]
    fn append_page_skips_known_tasks() {
        let mut b = board(&[(1, 2)]);
        let known = b.task(TaskId::Server(2)).cloned().unwrap();
        let mut fresh = known.clone();
        fresh.id = TaskId::Server(50);
        assert_eq!(b.append_page(1, vec![known, fresh]).unwrap(), 1);
        assert_eq!(order(&b, 1).last(), Some(&TaskId::Server(50)));
    }

    #[test]
    fn clear_keeps_selected_rows() {
        let mut b = board(&[(1, 3)]);
        let dropped = b
            .clear_section_tasks(1, |t| t.id == TaskId::Server(2))
            .unwrap();
        assert_eq!(dropped, vec![TaskId::Server(1), TaskId::Server(3)]);
        assert_eq!(order(&b, 1), vec![TaskId::Server(2)]);
        b.validate().unwrap();
    }
}
