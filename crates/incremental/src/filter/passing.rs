//! Dense outbound rows for the inbound rows that pass a filter.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{BitSet, RowIndex, RowMapper, NO_ROW};

/// Two-way map between passing inbound rows and dense outbound rows.
///
/// A removed outbound row is reserved: it still maps to its inbound row, so
/// downstream inputs can read it, until [`PassingRows::free_reserved`] releases it
/// for reuse.
#[derive(Debug)]
pub(crate) struct PassingRows {
    outbound_of: Vec<RowIndex>,
    inbound_of: Vec<RowIndex>,
    free: Vec<RowIndex>,
    active: Rc<RefCell<BitSet>>,
}

impl PassingRows {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            outbound_of: Vec::with_capacity(capacity),
            inbound_of: Vec::with_capacity(capacity),
            free: Vec::new(),
            active: Rc::new(RefCell::new(BitSet::with_capacity(capacity))),
        }
    }

    /// The live outbound rows, shared with the output's row provider.
    pub(crate) fn active(&self) -> Rc<RefCell<BitSet>> {
        self.active.clone()
    }

    #[inline]
    pub(crate) fn outbound_of(&self, row: RowIndex) -> Option<RowIndex> {
        self.outbound_of.get(row).copied().filter(|out| *out != NO_ROW)
    }

    #[inline]
    pub(crate) fn source_row_of(&self, out: RowIndex) -> RowIndex {
        self.inbound_of.get(out).copied().unwrap_or(NO_ROW)
    }

    /// Assigns an outbound row to `row`. Returns `None` if it already has one.
    pub(crate) fn insert(&mut self, row: RowIndex) -> Option<RowIndex> {
        if self.outbound_of(row).is_some() {
            return None;
        }
        let out = match self.free.pop() {
            Some(out) => out,
            None => {
                self.inbound_of.push(NO_ROW);
                self.inbound_of.len() - 1
            }
        };
        if row >= self.outbound_of.len() {
            self.outbound_of.resize(row + 1, NO_ROW);
        }
        self.outbound_of[row] = out;
        self.inbound_of[out] = row;
        self.active.borrow_mut().set(out);
        Some(out)
    }

    /// Unmaps the inbound row of `out`, keeping `out` readable until it is freed.
    pub(crate) fn remove_and_reserve(&mut self, out: RowIndex) {
        let row = self.source_row_of(out);
        if let Some(slot) = self.outbound_of.get_mut(row) {
            *slot = NO_ROW;
        }
        self.active.borrow_mut().unset(out);
    }

    /// Releases a reserved outbound row for reuse.
    pub(crate) fn free_reserved(&mut self, out: RowIndex) {
        if let Some(slot) = self.inbound_of.get_mut(out) {
            *slot = NO_ROW;
            self.free.push(out);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.active.borrow().count_ones()
    }

    pub(crate) fn clear(&mut self) {
        self.outbound_of.clear();
        self.inbound_of.clear();
        self.free.clear();
        self.active.borrow_mut().clear();
    }
}

/// Reads outbound filter rows from their inbound rows.
pub(crate) struct PassingRowMapper {
    rows: Rc<RefCell<PassingRows>>,
}

impl PassingRowMapper {
    pub(crate) fn new(rows: Rc<RefCell<PassingRows>>) -> Self {
        Self { rows }
    }
}

impl RowMapper for PassingRowMapper {
    fn source_row_of(&self, row: RowIndex) -> RowIndex {
        self.rows.borrow().source_row_of(row)
    }
}
