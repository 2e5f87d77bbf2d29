use std::collections::HashMap;

use crate::model::{Field, TaskId};

/// Generation stamps per task field.
///
/// Each local write to a field takes a fresh stamp. A pending request
/// remembers the stamps it was issued under; when it resolves, a field whose
/// stamp has moved on belongs to a newer write and must not be touched.
#[derive(Debug, Default)]
pub struct FieldClock {
    next: u64,
    stamps: HashMap<(TaskId, Field), u64>,
}

impl FieldClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local write to `fields`; returns the stamp
    pub fn stamp(&mut self, task: TaskId, fields: &[Field]) -> u64 {
        self.next += 1;
        for field in fields {
            self.stamps.insert((task, *field), self.next);
        }
        self.next
    }

    /// A stamp that claims no field; any later write supersedes it
    pub fn mark(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    /// One stamp shared by a write to the same fields of several tasks
    pub fn stamp_many(&mut self, tasks: &[TaskId], fields: &[Field]) -> u64 {
        self.next += 1;
        for task in tasks {
            for field in fields {
                self.stamps.insert((*task, *field), self.next);
            }
        }
        self.next
    }

    /// True if no write newer than `stamp` touched the field
    pub fn is_current(&self, task: TaskId, field: Field, stamp: u64) -> bool {
        self.stamps
            .get(&(task, field))
            .is_none_or(|current| *current <= stamp)
    }

    /// Fields of `fields` still owned by the write made at `stamp`
    pub fn current_fields(&self, task: TaskId, fields: &[Field], stamp: u64) -> Vec<Field> {
        fields
            .iter()
            .copied()
            .filter(|f| self.is_current(task, *f, stamp))
            .collect()
    }

    pub fn rekey(&mut self, from: TaskId, to: TaskId) {
        for field in Field::ALL {
            if let Some(stamp) = self.stamps.remove(&(from, field)) {
                self.stamps.insert((to, field), stamp);
            }
        }
    }

    pub fn forget(&mut self, task: TaskId) {
        self.stamps.retain(|(t, _), _| *t != task);
    }
}
