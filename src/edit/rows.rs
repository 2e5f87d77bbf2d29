use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use super::field_editor::FieldEditor;
use crate::api::RequestId;
use crate::model::{Field, SectionId, TaskId};

/// Stable local identity of a rendered row. Survives the temp → server id
/// swap, so focus and the editor's cursor stay attached to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(pub u64);

/// Per-row resources
#[derive(Debug, Clone)]
pub struct Row {
    pub key: RowKey,
    pub task: TaskId,
    pub name: FieldEditor,
    /// Fields the user has set on a temporary row (the create bundle)
    pub touched: BTreeSet<Field>,
    /// Create request in flight for a temporary row
    pub creating: Option<RequestId>,
}

/// Indirection table from task id to row resources
#[derive(Debug, Default)]
pub struct RowRegistry {
    next: u64,
    rows: HashMap<RowKey, Row>,
    by_task: HashMap<TaskId, RowKey>,
}

impl RowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The row for a task, created on first use
    pub fn ensure(&mut self, task: TaskId, delay: Duration) -> &mut Row {
        let key = match self.by_task.get(&task) {
            Some(key) => *key,
            None => {
                self.next += 1;
                let key = RowKey(self.next);
                self.by_task.insert(task, key);
                key
            }
        };
        self.rows.entry(key).or_insert_with(|| Row {
            key,
            task,
            name: FieldEditor::new(Field::Name, delay),
            touched: BTreeSet::new(),
            creating: None,
        })
    }

    pub fn key_of(&self, task: TaskId) -> Option<RowKey> {
        self.by_task.get(&task).copied()
    }

    pub fn get(&self, task: TaskId) -> Option<&Row> {
        self.by_task.get(&task).and_then(|k| self.rows.get(k))
    }

    pub fn get_mut(&mut self, task: TaskId) -> Option<&mut Row> {
        let key = self.by_task.get(&task)?;
        self.rows.get_mut(key)
    }

    /// Point a row at its server id. The row key and everything hanging
    /// off it stay the same.
    pub fn rekey(&mut self, from: TaskId, to: TaskId) -> Option<RowKey> {
        let key = self.by_task.remove(&from)?;
        self.by_task.insert(to, key);
        if let Some(row) = self.rows.get_mut(&key) {
            row.task = to;
        }
        Some(key)
    }

    pub fn remove(&mut self, task: TaskId) -> Option<Row> {
        let key = self.by_task.remove(&task)?;
        self.rows.remove(&key)
    }

    /// Rows whose editors are not in display state
    pub fn active(&self) -> impl Iterator<Item = &Row> {
        self.rows.values().filter(|r| r.name.is_active())
    }

    pub fn tasks(&self) -> Vec<TaskId> {
        self.by_task.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One in-flight save per task, and one in-flight ordering change per
/// section. A reorder or move sends the section's whole order, so a second
/// one must not carry the first's unconfirmed position.
#[derive(Debug, Default)]
pub struct SaveGuard {
    inflight: HashMap<TaskId, RequestId>,
    ordering: HashMap<SectionId, RequestId>,
}

impl SaveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the task for `request`. False if another save holds it.
    pub fn try_acquire(&mut self, task: TaskId, request: RequestId) -> bool {
        if self.inflight.contains_key(&task) {
            return false;
        }
        self.inflight.insert(task, request);
        true
    }

    /// Claim the task and every listed section for `request`. Claims
    /// nothing and returns false if any of them is already held.
    pub fn try_acquire_ordering(
        &mut self,
        task: TaskId,
        sections: &[SectionId],
        request: RequestId,
    ) -> bool {
        if self.inflight.contains_key(&task)
            || sections.iter().any(|s| self.ordering.contains_key(s))
        {
            return false;
        }
        self.inflight.insert(task, request);
        for section in sections {
            self.ordering.insert(*section, request);
        }
        true
    }

    pub fn is_ordering(&self, section: SectionId) -> bool {
        self.ordering.contains_key(&section)
    }

    /// Release the claim if `request` holds it
    pub fn release(&mut self, task: TaskId, request: RequestId) {
        if self.inflight.get(&task) == Some(&request) {
            self.inflight.remove(&task);
        }
    }

    /// Release whatever task `request` holds
    pub fn release_request(&mut self, request: RequestId) {
        self.inflight.retain(|_, r| *r != request);
        self.ordering.retain(|_, r| *r != request);
    }

    pub fn is_busy(&self, task: TaskId) -> bool {
        self.inflight.contains_key(&task)
    }

    pub fn rekey(&mut self, from: TaskId, to: TaskId) {
        if let Some(r) = self.inflight.remove(&from) {
            self.inflight.insert(to, r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(800);

    #[test]
    fn rekey_preserves_row_identity() {
        let mut rows = RowRegistry::new();
        let key = rows.ensure(TaskId::Temp(1), DELAY).key;
        rows.get_mut(TaskId::Temp(1)).unwrap().name.begin("Write docs");
        assert_eq!(rows.rekey(TaskId::Temp(1), TaskId::Server(40)), Some(key));
        let row = rows.get(TaskId::Server(40)).unwrap();
        assert_eq!(row.key, key);
        assert_eq!(row.task, TaskId::Server(40));
        assert_eq!(row.name.cursor(), "Write docs".len());
        assert!(rows.get(TaskId::Temp(1)).is_none());
    }

    #[test]
    fn ensure_is_idempotent() {
        let mut rows = RowRegistry::new();
        let a = rows.ensure(TaskId::Server(1), DELAY).key;
        let b = rows.ensure(TaskId::Server(1), DELAY).key;
        assert_eq!(a, b);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn guard_rejects_second_save() {
        let mut guard = SaveGuard::new();
        let task = TaskId::Server(5);
        assert!(guard.try_acquire(task, RequestId(1)));
        assert!(!guard.try_acquire(task, RequestId(2)));
        guard.release(task, RequestId(2));
        assert!(guard.is_busy(task));
        guard.release(task, RequestId(1));
        assert!(guard.try_acquire(task, RequestId(3)));
    }

    #[test]
    fn ordering_claim_blocks_other_tasks_in_the_section() {
        let mut guard = SaveGuard::new();
        assert!(guard.try_acquire_ordering(TaskId::Server(1), &[7], RequestId(1)));
        assert!(!guard.try_acquire_ordering(TaskId::Server(2), &[7], RequestId(2)));
        // a failed claim takes nothing
        assert!(!guard.is_busy(TaskId::Server(2)));
        assert!(guard.try_acquire_ordering(TaskId::Server(2), &[8], RequestId(3)));
        // plain field saves are not affected by the section claim
        assert!(guard.try_acquire(TaskId::Server(3), RequestId(4)));

        guard.release_request(RequestId(1));
        assert!(!guard.is_ordering(7));
        assert!(!guard.is_busy(TaskId::Server(1)));
        assert!(!guard.try_acquire_ordering(TaskId::Server(1), &[7, 8], RequestId(5)));
    }

    #[test]
    fn guard_follows_rekey() {
        let mut guard = SaveGuard::new();
        guard.try_acquire(TaskId::Temp(1), RequestId(1));
        guard.rekey(TaskId::Temp(1), TaskId::Server(2));
        assert!(guard.is_busy(TaskId::Server(2)));
        assert!(!guard.is_busy(TaskId::Temp(1)));
        guard.release_request(RequestId(1));
        assert!(!guard.is_busy(TaskId::Server(2)));
    }
}
