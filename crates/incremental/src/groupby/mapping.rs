//! Row to group assignment.

use crate::one_to_many::OneToMany;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use weft_core::{RowIndex, RowMapper, NO_ROW};

/// Group id of an unmapped row.
pub const NO_GROUP: usize = usize::MAX;

/// Tracks which group each inbound row belongs to and the rows of each group.
///
/// A row belongs to at most one group. A group with no rows is absent from the
/// GroupBy output. Rows within a group keep their insertion order, so the first row
/// of a group is the oldest row still in it. Mapping, unmapping, counting and the
/// first-row lookup are O(1).
#[derive(Debug, Default)]
pub struct GroupMapping {
    links: OneToMany,
}

impl GroupMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mapping with room for `capacity` rows and groups.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            links: OneToMany::with_capacity(capacity),
        }
    }

    /// Assigns `row` to `group`, first removing it from any previous group.
    pub fn map_row_to_group(&mut self, row: RowIndex, group: usize) {
        self.links.link(row, group);
    }

    /// Removes `row` from its group and returns that group, or [`NO_GROUP`].
    pub fn unmap_row(&mut self, row: RowIndex) -> usize {
        self.links.unlink(row).unwrap_or(NO_GROUP)
    }

    /// Returns the group of `row`, or [`NO_GROUP`].
    #[inline]
    pub fn group_of_row(&self, row: RowIndex) -> usize {
        self.links.parent_of(row).unwrap_or(NO_GROUP)
    }

    /// Returns the number of rows in `group`.
    #[inline]
    pub fn group_count(&self, group: usize) -> usize {
        self.links.count(group)
    }

    /// Returns the oldest row of `group`, or [`NO_ROW`] if the group is empty.
    #[inline]
    pub fn first_row(&self, group: usize) -> RowIndex {
        self.links.first(group).unwrap_or(NO_ROW)
    }

    /// Iterates the rows of `group`, oldest first.
    pub fn rows_of(&self, group: usize) -> impl Iterator<Item = RowIndex> + '_ {
        self.links.children(group)
    }

    /// Forgets every row and group.
    pub fn reset(&mut self) {
        self.links.clear();
    }
}

/// Maps a group to its oldest row, so forwarded fields read that row's values.
pub struct FirstRowMapper {
    mapping: Rc<RefCell<GroupMapping>>,
}

impl FirstRowMapper {
    pub fn new(mapping: Rc<RefCell<GroupMapping>>) -> Self {
        Self { mapping }
    }
}

impl RowMapper for FirstRowMapper {
    fn source_row_of(&self, group: RowIndex) -> RowIndex {
        self.mapping.borrow().first_row(group)
    }
}

/// Rows touched per group during one batch, in first-touched group order.
#[derive(Debug, Default)]
pub struct GroupRowMods {
    groups: Vec<usize>,
    rows: HashMap<usize, Vec<RowIndex>>,
}

impl GroupRowMods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `row` under `group`.
    pub fn add(&mut self, group: usize, row: RowIndex) {
        self.rows
            .entry(group)
            .or_insert_with(|| {
                self.groups.push(group);
                Vec::new()
            })
            .push(row);
    }

    /// Calls `f` once per group with its rows.
    pub fn for_each(&self, mut f: impl FnMut(usize, &[RowIndex])) {
        for group in &self.groups {
            if let Some(rows) = self.rows.get(group) {
                f(*group, rows);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.rows.clear();
    }
}
