use std::collections::HashMap;

use super::clock::FieldClock;
use super::mutation::Mutation;
use crate::api::RequestId;
use crate::model::TaskId;
use crate::store::{Board, StoreError};

/// A mutation waiting for its request to resolve
#[derive(Debug, Clone, PartialEq)]
pub struct Pending {
    pub mutation: Mutation,
    /// Field clock stamp taken when the mutation was applied
    pub stamp: u64,
}

/// In-flight optimistic mutations, keyed by the request that confirms them
#[derive(Debug, Default)]
pub struct Ledger {
    pending: HashMap<RequestId, Pending>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: RequestId, mutation: Mutation, stamp: u64) {
        tracing::trace!(request = id.0, kind = mutation.label(), "mutation recorded");
        self.pending.insert(id, Pending { mutation, stamp });
    }

    /// The server accepted the request; forget the inverse
    pub fn confirm(&mut self, id: RequestId) -> Option<Pending> {
        self.pending.remove(&id)
    }

    /// The server rejected the request; undo what is still ours to undo.
    ///
    /// Patched fields that a newer local write has taken over keep their
    /// newer value. Returns the mutation that was applied, if any.
    pub fn rollback(
        &mut self,
        id: RequestId,
        board: &mut Board,
        clock: &FieldClock,
    ) -> Result<Option<Mutation>, StoreError> {
        let Some(pending) = self.pending.remove(&id) else {
            return Ok(None);
        };
        let Some(undo) = revert(&pending.mutation, pending.stamp, clock) else {
            return Ok(None);
        };
        undo.apply(board)?;
        Ok(Some(undo))
    }

    pub fn get(&self, id: RequestId) -> Option<&Pending> {
        self.pending.get(&id)
    }

    /// True if any pending mutation touches the task
    pub fn touches(&self, task: TaskId) -> bool {
        self.pending
            .values()
            .any(|p| p.mutation.tasks().contains(&task))
    }

    pub fn rekey(&mut self, from: TaskId, to: TaskId) {
        for pending in self.pending.values_mut() {
            pending.mutation.rekey(from, to);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Inverse of `mutation`, restricted to fields still owned by `stamp`
fn revert(mutation: &Mutation, stamp: u64, clock: &FieldClock) -> Option<Mutation> {
    match mutation {
        Mutation::Patch {
            task,
            patch,
            inverse,
        } => {
            let keep = clock.current_fields(*task, &inverse.fields(), stamp);
            let restore = inverse.retain(&keep);
            if restore.is_empty() {
                return None;
            }
            Some(Mutation::Patch {
                task: *task,
                patch: restore,
                inverse: patch.retain(&keep),
            })
        }
        Mutation::Batch(items) => {
            let undone: Vec<Mutation> = items
                .iter()
                .rev()
                .filter_map(|m| revert(m, stamp, clock))
                .collect();
            (!undone.is_empty()).then_some(Mutation::Batch(undone))
        }
        other => Some(other.inverse()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Priority, TaskFields};
    use crate::store::test_support::{board, order};
    use pretty_assertions::assert_eq;

    fn patch(board: &mut Board, task: TaskId, fields: TaskFields) -> Mutation {
        let record = board.task_mut(task).unwrap();
        let inverse = fields.apply_to(record);
        Mutation::Patch {
            task,
            patch: fields,
            inverse,
        }
    }

    #[test]
    fn rollback_restores_reorder() {
        let mut b = board(&[(1, 3)]);
        let mut ledger = Ledger::new();
        let clock = FieldClock::new();
        let m = Mutation::Reorder {
            section: 1,
            task: TaskId::Server(3),
            from: 2,
            to: 0,
        };
        m.apply(&mut b).unwrap();
        ledger.record(RequestId(1), m, 0);
        ledger.rollback(RequestId(1), &mut b, &clock).unwrap();
        assert_eq!(
            order(&b, 1),
            vec![TaskId::Server(1), TaskId::Server(2), TaskId::Server(3)]
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn confirm_drops_inverse() {
        let mut b = board(&[(1, 2)]);
        let mut ledger = Ledger::new();
        let clock = FieldClock::new();
        let m = Mutation::Reorder {
            section: 1,
            task: TaskId::Server(1),
            from: 0,
            to: 1,
        };
        m.apply(&mut b).unwrap();
        ledger.record(RequestId(4), m, 0);
        assert!(ledger.touches(TaskId::Server(1)));
        assert!(ledger.confirm(RequestId(4)).is_some());
        assert_eq!(ledger.rollback(RequestId(4), &mut b, &clock), Ok(None));
        assert_eq!(order(&b, 1), vec![TaskId::Server(2), TaskId::Server(1)]);
    }

    #[test]
    fn rollback_skips_superseded_fields() {
        let mut b = board(&[(1, 1)]);
        let id = TaskId::Server(1);
        let mut ledger = Ledger::new();
        let mut clock = FieldClock::new();

        let first = TaskFields {
            priority: Some(Priority::High),
            status: Some("in_progress".into()),
            ..Default::default()
        };
        let stamp = clock.stamp(id, &first.fields());
        let m = patch(&mut b, id, first);
        ledger.record(RequestId(1), m, stamp);

        // A newer write to priority lands before the first request fails
        let second = TaskFields {
            priority: Some(Priority::Low),
            ..Default::default()
        };
        let stamp2 = clock.stamp(id, &[Field::Priority]);
        let m2 = patch(&mut b, id, second);
        ledger.record(RequestId(2), m2, stamp2);

        ledger.rollback(RequestId(1), &mut b, &clock).unwrap();
        let task = b.task(id).unwrap();
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.status, "pending");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn rekey_rewrites_pending_targets() {
        let mut ledger = Ledger::new();
        ledger.record(
            RequestId(1),
            Mutation::Reorder {
                section: 1,
                task: TaskId::Temp(1),
                from: 0,
                to: 1,
            },
            0,
        );
        ledger.rekey(TaskId::Temp(1), TaskId::Server(9));
        assert!(ledger.touches(TaskId::Server(9)));
        assert!(!ledger.touches(TaskId::Temp(1)));
    }
}
