//! Join output change tracking.

use crate::change::{StateChangeSet, TransformOutput};
use weft_core::{FieldBitSet, RowIndex};

/// Receives join row transitions from a join mapper.
///
/// `row` is the output row, which is the left row's index.
pub trait JoinListener {
    fn join_added(&mut self, row: RowIndex);

    /// The joined row changed. The flags say whether the left or right source row
    /// feeding it was replaced, so every field of that side must be treated as changed.
    fn join_updated(&mut self, row: RowIndex, left_replaced: bool, right_replaced: bool);

    fn join_removed(&mut self, row: RowIndex);
}

/// Buffers join transitions for one batch and fires them to the Join output.
#[derive(Debug, Default)]
pub struct JoinChangeTracker {
    changes: StateChangeSet,
    left_fields: FieldBitSet,
    right_fields: FieldBitSet,
}

impl JoinChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the output fields owned by each side of the current schema.
    pub fn set_outbound_field_ids(&mut self, left: FieldBitSet, right: FieldBitSet, field_count: usize) {
        self.left_fields = left;
        self.right_fields = right;
        self.changes.set_field_count(field_count);
    }

    /// Marks an output field as changed for this batch.
    pub fn change_field(&mut self, field_id: usize) {
        self.changes.change_field(field_id);
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Emits the batch to `output`.
    pub fn fire(&mut self, output: &TransformOutput, on_removed: impl FnMut(RowIndex)) {
        self.changes.fire(output, on_removed);
    }

    /// Drops everything pending and forgets the field sets.
    pub fn reset(&mut self) {
        self.changes.reset();
        self.left_fields.clear();
        self.right_fields.clear();
    }
}

impl JoinListener for JoinChangeTracker {
    fn join_added(&mut self, row: RowIndex) {
        self.changes.add_row(row);
    }

    fn join_updated(&mut self, row: RowIndex, left_replaced: bool, right_replaced: bool) {
        if self.changes.is_added(row) {
            return;
        }
        self.changes.change_row(row);
        if left_replaced {
            self.changes.change_fields(&self.left_fields);
        }
        if right_replaced {
            self.changes.change_fields(&self.right_fields);
        }
    }

    fn join_removed(&mut self, row: RowIndex) {
        self.changes.remove_row(row);
    }
}
