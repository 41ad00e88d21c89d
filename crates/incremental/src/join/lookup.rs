//! Key-based lookup join mapping.

use super::tracker::JoinListener;
use crate::interner::{JoinInterner, UNSET_KEY};
use crate::one_to_many::OneToMany;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use weft_core::{BitSet, IdentityRowMapper, RowIndex, RowMapper, NO_ROW};

#[derive(Debug, Default)]
struct LookupTables {
    /// Left rows by key, in mapping order.
    lefts: OneToMany,
    right_row_to_key: Vec<usize>,
    key_right: Vec<RowIndex>,
}

impl LookupTables {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            lefts: OneToMany::with_capacity(capacity),
            right_row_to_key: Vec::with_capacity(capacity),
            key_right: Vec::with_capacity(capacity),
        }
    }

    fn left_key(&self, row: RowIndex) -> usize {
        self.lefts.parent_of(row).unwrap_or(UNSET_KEY)
    }

    fn right_key(&self, row: RowIndex) -> usize {
        self.right_row_to_key.get(row).copied().unwrap_or(UNSET_KEY)
    }

    fn right_of_key(&self, key: usize) -> RowIndex {
        self.key_right.get(key).copied().unwrap_or(NO_ROW)
    }

    fn lefts_of_key(&self, key: usize) -> Vec<RowIndex> {
        self.lefts.children(key).collect()
    }

    fn map_left(&mut self, row: RowIndex, key: usize) {
        self.lefts.link(row, key);
    }

    fn unmap_left(&mut self, row: RowIndex) -> usize {
        self.lefts.unlink(row).unwrap_or(UNSET_KEY)
    }

    fn map_right(&mut self, row: RowIndex, key: usize) {
        if row >= self.right_row_to_key.len() {
            self.right_row_to_key.resize(row + 1, UNSET_KEY);
        }
        if key >= self.key_right.len() {
            self.key_right.resize(key + 1, NO_ROW);
        }
        self.right_row_to_key[row] = key;
        self.key_right[key] = row;
    }

    fn clear(&mut self) {
        self.lefts.clear();
        self.right_row_to_key.clear();
        self.key_right.clear();
    }
}

/// Maps a join output row to the right row joined with it.
struct RightRowMapper {
    tables: Rc<RefCell<LookupTables>>,
}

impl RowMapper for RightRowMapper {
    fn source_row_of(&self, row: RowIndex) -> RowIndex {
        let tables = self.tables.borrow();
        match tables.left_key(row) {
            UNSET_KEY => NO_ROW,
            key => tables.right_of_key(key),
        }
    }
}

/// Joins left rows to the right row with the same key.
///
/// Each key holds any number of left rows and at most one right row. Output rows are
/// indexed by left row. In an inner join a left row is active only while its key
/// has a right row; in an outer join every mapped left row is active and reads
/// defaults for the right side while unmatched.
pub struct LookupJoinMapper {
    outer: bool,
    interner: Box<dyn JoinInterner>,
    tables: Rc<RefCell<LookupTables>>,
    active: Rc<RefCell<BitSet>>,
}

impl LookupJoinMapper {
    pub fn new(interner: Box<dyn JoinInterner>, outer: bool, capacity: usize) -> Self {
        Self {
            outer,
            interner,
            tables: Rc::new(RefCell::new(LookupTables::with_capacity(capacity))),
            active: Rc::new(RefCell::new(BitSet::with_capacity(capacity))),
        }
    }

    /// Returns true for an outer join.
    pub fn is_outer(&self) -> bool {
        self.outer
    }

    /// Returns the shared set of active output rows.
    pub fn active_rows(&self) -> Rc<RefCell<BitSet>> {
        self.active.clone()
    }

    /// Returns the mapper from output row to left row.
    pub fn left_row_mapper(&self) -> Rc<dyn RowMapper> {
        Rc::new(IdentityRowMapper)
    }

    /// Returns the mapper from output row to the joined right row.
    pub fn right_row_mapper(&self) -> Rc<dyn RowMapper> {
        Rc::new(RightRowMapper {
            tables: self.tables.clone(),
        })
    }

    pub fn interner_mut(&mut self) -> &mut dyn JoinInterner {
        self.interner.as_mut()
    }

    /// Forgets every mapped row and deactivates every output row.
    pub fn reset(&mut self) {
        self.tables.borrow_mut().clear();
        self.active.borrow_mut().clear();
    }

    pub fn left_row_added(&mut self, row: RowIndex, listener: &mut dyn JoinListener) {
        let key = self.interner.left().intern(row);
        if key == UNSET_KEY {
            return;
        }
        let matched = {
            let mut tables = self.tables.borrow_mut();
            tables.map_left(row, key);
            tables.right_of_key(key) != NO_ROW
        };
        if self.outer || matched {
            self.active.borrow_mut().set(row);
            listener.join_added(row);
        }
    }

    pub fn left_row_changed(&mut self, row: RowIndex, reevaluate_key: bool, listener: &mut dyn JoinListener) {
        let old_key = self.tables.borrow().left_key(row);
        if old_key == UNSET_KEY {
            return;
        }
        if reevaluate_key {
            let new_key = self.interner.left().intern(row);
            if new_key != old_key && new_key != UNSET_KEY {
                let matched = {
                    let mut tables = self.tables.borrow_mut();
                    tables.unmap_left(row);
                    tables.map_left(row, new_key);
                    tables.right_of_key(new_key) != NO_ROW
                };
                let was_active = self.active.borrow().get(row);
                let now_active = self.outer || matched;
                match (was_active, now_active) {
                    (false, true) => {
                        self.active.borrow_mut().set(row);
                        listener.join_added(row);
                    }
                    (true, false) => {
                        self.active.borrow_mut().unset(row);
                        listener.join_removed(row);
                    }
                    (true, true) => listener.join_updated(row, false, true),
                    (false, false) => {}
                }
                return;
            }
        }
        if self.active.borrow().get(row) {
            listener.join_updated(row, false, false);
        }
    }

    pub fn left_row_removed(&mut self, row: RowIndex, listener: &mut dyn JoinListener) {
        if self.tables.borrow_mut().unmap_left(row) == UNSET_KEY {
            return;
        }
        if self.active.borrow_mut().unset(row) {
            listener.join_removed(row);
        }
    }

    pub fn right_row_added(&mut self, row: RowIndex, listener: &mut dyn JoinListener) {
        let key = self.interner.right().intern(row);
        if key == UNSET_KEY {
            return;
        }
        self.map_right(row, UNSET_KEY, key, listener);
    }

    pub fn right_row_changed(&mut self, row: RowIndex, reevaluate_key: bool, listener: &mut dyn JoinListener) {
        let old_key = self.tables.borrow().right_key(row);
        if old_key == UNSET_KEY {
            return;
        }
        if reevaluate_key {
            let new_key = self.interner.right().intern(row);
            if new_key != old_key && new_key != UNSET_KEY {
                self.map_right(row, old_key, new_key, listener);
                return;
            }
        }
        let lefts = {
            let tables = self.tables.borrow();
            if tables.right_of_key(old_key) != row {
                return;
            }
            tables.lefts_of_key(old_key)
        };
        let active = self.active.borrow();
        for left in lefts {
            if active.get(left) {
                listener.join_updated(left, false, false);
            }
        }
    }

    pub fn right_row_removed(&mut self, row: RowIndex, listener: &mut dyn JoinListener) {
        let key = {
            let mut tables = self.tables.borrow_mut();
            let key = tables.right_key(row);
            if key == UNSET_KEY {
                return;
            }
            tables.right_row_to_key[row] = UNSET_KEY;
            key
        };
        self.unmap_right(row, key, listener);
    }

    fn map_right(&mut self, row: RowIndex, old_key: usize, new_key: usize, listener: &mut dyn JoinListener) {
        if old_key != UNSET_KEY {
            self.unmap_right(row, old_key, listener);
        }
        let lefts = {
            let mut tables = self.tables.borrow_mut();
            tables.map_right(row, new_key);
            tables.lefts_of_key(new_key)
        };
        let mut active = self.active.borrow_mut();
        for left in lefts {
            if self.outer || !active.set(left) {
                listener.join_updated(left, false, true);
            } else {
                listener.join_added(left);
            }
        }
    }

    /// Detaches `row` from `key` if it is the right row currently joined there.
    fn unmap_right(&mut self, row: RowIndex, key: usize, listener: &mut dyn JoinListener) {
        let lefts = {
            let mut tables = self.tables.borrow_mut();
            if tables.right_of_key(key) != row {
                return;
            }
            tables.key_right[key] = NO_ROW;
            tables.lefts_of_key(key)
        };
        let mut active = self.active.borrow_mut();
        for left in lefts {
            if self.outer {
                listener.join_updated(left, false, true);
            } else if active.unset(left) {
                listener.join_removed(left);
            }
        }
    }
}
