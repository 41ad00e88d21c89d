//! Per-batch change buffering.

use super::output::TransformOutput;
use alloc::vec::Vec;
use weft_core::{FieldBitSet, RowIndex, NO_ROW};

/// An insertion-ordered set of rows.
///
/// Insert, remove and membership are O(1). A removed row leaves an empty slot that
/// is compacted away the next time the rows are read.
#[derive(Clone, Debug, Default)]
pub struct RowSet {
    rows: Vec<RowIndex>,
    /// Slot of each member in `rows`, indexed by row.
    positions: Vec<usize>,
    len: usize,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row. Returns true if it was not present.
    pub fn insert(&mut self, row: RowIndex) -> bool {
        if self.contains(row) {
            return false;
        }
        if row >= self.positions.len() {
            self.positions.resize(row + 1, NO_ROW);
        }
        self.positions[row] = self.rows.len();
        self.rows.push(row);
        self.len += 1;
        true
    }

    /// Removes a row. Returns true if it was present.
    pub fn remove(&mut self, row: RowIndex) -> bool {
        if !self.contains(row) {
            return false;
        }
        let slot = core::mem::replace(&mut self.positions[row], NO_ROW);
        self.rows[slot] = NO_ROW;
        self.len -= 1;
        true
    }

    #[inline]
    pub fn contains(&self, row: RowIndex) -> bool {
        self.positions.get(row).is_some_and(|slot| *slot != NO_ROW)
    }

    /// Returns the rows in insertion order.
    pub fn as_slice(&mut self) -> &[RowIndex] {
        if self.rows.len() != self.len {
            self.compact();
        }
        &self.rows
    }

    fn compact(&mut self) {
        self.rows.retain(|row| *row != NO_ROW);
        for (slot, row) in self.rows.iter().enumerate() {
            self.positions[*row] = slot;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        for row in self.rows.drain(..) {
            if row != NO_ROW {
                self.positions[row] = NO_ROW;
            }
        }
        self.len = 0;
    }
}

/// Buffers the row-level outcome of one batch until it is fired.
///
/// A row is in at most one of added, changed and removed:
///
/// - removing a row added in the same batch cancels both
/// - adding a row removed in the same batch reports it as changed in every field
/// - changing a row added or removed in the same batch is ignored
///
/// Firing emits removes, then adds, then changes. Changes are only emitted when at
/// least one field is marked changed.
#[derive(Debug, Default)]
pub struct StateChangeSet {
    added: RowSet,
    changed: RowSet,
    removed: RowSet,
    changed_fields: FieldBitSet,
    full_row_changes: bool,
    field_count: usize,
}

impl StateChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of fields in the current output schema. Used to expand full-row
    /// changes.
    pub fn set_field_count(&mut self, field_count: usize) {
        self.field_count = field_count;
    }

    pub fn add_row(&mut self, row: RowIndex) {
        if self.removed.remove(row) {
            self.changed.insert(row);
            self.full_row_changes = true;
        } else {
            self.added.insert(row);
        }
    }

    pub fn change_row(&mut self, row: RowIndex) {
        if !self.added.contains(row) && !self.removed.contains(row) {
            self.changed.insert(row);
        }
    }

    pub fn remove_row(&mut self, row: RowIndex) {
        self.changed.remove(row);
        if !self.added.remove(row) {
            self.removed.insert(row);
        }
    }

    /// Marks an output field as changed for this batch.
    pub fn change_field(&mut self, field_id: usize) {
        self.changed_fields.set(field_id);
    }

    /// Marks every field in `fields` as changed for this batch.
    pub fn change_fields(&mut self, fields: &FieldBitSet) {
        self.changed_fields.union_with(fields);
    }

    /// Returns true if the row was added in this batch.
    pub fn is_added(&self, row: RowIndex) -> bool {
        self.added.contains(row)
    }

    /// Returns the changed fields marked so far.
    pub fn changed_fields(&self) -> &FieldBitSet {
        &self.changed_fields
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    /// Emits the batch to `output`, calls `on_removed` for every removed row, then resets.
    pub fn fire(&mut self, output: &TransformOutput, mut on_removed: impl FnMut(RowIndex)) {
        output.notify_removes(self.removed.as_slice());
        output.notify_adds(self.added.as_slice());
        if !self.changed.is_empty() {
            if self.full_row_changes {
                self.changed_fields.set_range(self.field_count);
            }
            if !self.changed_fields.is_empty() {
                output.notify_changes(self.changed.as_slice(), &self.changed_fields);
            }
        }
        for &row in self.removed.as_slice() {
            on_removed(row);
        }
        self.reset();
    }

    /// Drops everything pending.
    pub fn reset(&mut self) {
        self.added.clear();
        self.changed.clear();
        self.removed.clear();
        self.changed_fields.clear();
        self.full_row_changes = false;
    }
}
