//! Compact one-to-many links between dense ids.

use alloc::vec::Vec;

const NONE: usize = usize::MAX;

/// Links each child id to at most one parent id.
///
/// The children of a parent form a doubly-linked list threaded through per-child
/// `prev`/`next` slots, so linking, unlinking, counting and reading the first child
/// are all O(1). Children keep their link order: a child linked later is iterated
/// after every child already linked to the same parent.
#[derive(Clone, Debug, Default)]
pub struct OneToMany {
    parent: Vec<usize>,
    prev: Vec<usize>,
    next: Vec<usize>,
    head: Vec<usize>,
    tail: Vec<usize>,
    count: Vec<usize>,
}

impl OneToMany {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: Vec::with_capacity(capacity),
            prev: Vec::with_capacity(capacity),
            next: Vec::with_capacity(capacity),
            head: Vec::with_capacity(capacity),
            tail: Vec::with_capacity(capacity),
            count: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn parent_of(&self, child: usize) -> Option<usize> {
        self.parent.get(child).copied().filter(|p| *p != NONE)
    }

    /// Appends `child` to the children of `parent`, unlinking it from any previous parent.
    pub fn link(&mut self, child: usize, parent: usize) {
        if self.parent_of(child).is_some() {
            self.unlink(child);
        }
        if child >= self.parent.len() {
            self.parent.resize(child + 1, NONE);
            self.prev.resize(child + 1, NONE);
            self.next.resize(child + 1, NONE);
        }
        if parent >= self.head.len() {
            self.head.resize(parent + 1, NONE);
            self.tail.resize(parent + 1, NONE);
            self.count.resize(parent + 1, 0);
        }

        let tail = self.tail[parent];
        self.parent[child] = parent;
        self.prev[child] = tail;
        self.next[child] = NONE;
        if tail == NONE {
            self.head[parent] = child;
        } else {
            self.next[tail] = child;
        }
        self.tail[parent] = child;
        self.count[parent] += 1;
    }

    /// Unlinks `child` and returns its former parent.
    pub fn unlink(&mut self, child: usize) -> Option<usize> {
        let parent = self.parent_of(child)?;
        let (prev, next) = (self.prev[child], self.next[child]);
        if prev == NONE {
            self.head[parent] = next;
        } else {
            self.next[prev] = next;
        }
        if next == NONE {
            self.tail[parent] = prev;
        } else {
            self.prev[next] = prev;
        }
        self.parent[child] = NONE;
        self.prev[child] = NONE;
        self.next[child] = NONE;
        self.count[parent] -= 1;
        Some(parent)
    }

    #[inline]
    pub fn count(&self, parent: usize) -> usize {
        self.count.get(parent).copied().unwrap_or(0)
    }

    /// Returns the earliest linked child of `parent`.
    #[inline]
    pub fn first(&self, parent: usize) -> Option<usize> {
        self.head.get(parent).copied().filter(|c| *c != NONE)
    }

    /// Iterates the children of `parent` in link order.
    pub fn children(&self, parent: usize) -> Children<'_> {
        Children {
            links: self,
            cursor: self.first(parent).unwrap_or(NONE),
        }
    }

    pub fn clear(&mut self) {
        self.parent.clear();
        self.prev.clear();
        self.next.clear();
        self.head.clear();
        self.tail.clear();
        self.count.clear();
    }
}

pub struct Children<'a> {
    links: &'a OneToMany,
    cursor: usize,
}

impl Iterator for Children<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == NONE {
            return None;
        }
        let child = self.cursor;
        self.cursor = self.links.next[child];
        Some(child)
    }
}
