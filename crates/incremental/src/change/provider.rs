//! Row providers: the current row set of an output, replayed to late subscribers.

use super::output::TransformOutput;
use alloc::rc::Rc;
use core::cell::RefCell;
use weft_core::{BitSet, RowIndex};

/// Enumerates the rows an output currently holds.
pub trait RowProvider {
    /// Calls `f` for every live row in ascending order.
    fn for_each_row(&self, f: &mut dyn FnMut(RowIndex));
}

/// Provides no rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRowProvider;

impl RowProvider for EmptyRowProvider {
    fn for_each_row(&self, _f: &mut dyn FnMut(RowIndex)) {}
}

/// Provides the rows set in a shared bit set.
#[derive(Clone)]
pub struct BitSetRowProvider {
    rows: Rc<RefCell<BitSet>>,
}

impl BitSetRowProvider {
    pub fn new(rows: Rc<RefCell<BitSet>>) -> Self {
        Self { rows }
    }
}

impl RowProvider for BitSetRowProvider {
    fn for_each_row(&self, f: &mut dyn FnMut(RowIndex)) {
        self.rows.borrow().iter_ones().for_each(f);
    }
}

/// The source an operator is currently attached to, shared with its row provider.
pub type SourceSlot = Rc<RefCell<Option<TransformOutput>>>;

/// Provides the rows of whatever source an operator is attached to.
///
/// Used by pass-through outputs whose rows are exactly their source's rows.
#[derive(Clone)]
pub struct DelegatedRowProvider {
    source: SourceSlot,
}

impl DelegatedRowProvider {
    pub fn new(source: SourceSlot) -> Self {
        Self { source }
    }
}

impl RowProvider for DelegatedRowProvider {
    fn for_each_row(&self, f: &mut dyn FnMut(RowIndex)) {
        let source = self.source.borrow().clone();
        if let Some(source) = source {
            source.for_each_row(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn test_bitset_provider() {
        let rows = Rc::new(RefCell::new(BitSet::from_bits([4, 1, 9])));
        let provider = BitSetRowProvider::new(rows.clone());
        let mut seen = Vec::new();
        provider.for_each_row(&mut |r| seen.push(r));
        assert_eq!(seen, vec![1, 4, 9]);

        rows.borrow_mut().unset(4);
        seen.clear();
        provider.for_each_row(&mut |r| seen.push(r));
        assert_eq!(seen, vec![1, 9]);
    }

    #[test]
    fn test_delegated_provider_follows_source() {
        let rows = Rc::new(RefCell::new(BitSet::from_bits([2, 3])));
        let upstream = TransformOutput::new(BitSetRowProvider::new(rows));
        let slot: SourceSlot = Rc::new(RefCell::new(None));
        let provider = DelegatedRowProvider::new(slot.clone());

        let mut seen = Vec::new();
        provider.for_each_row(&mut |r| seen.push(r));
        assert!(seen.is_empty());

        *slot.borrow_mut() = Some(upstream);
        provider.for_each_row(&mut |r| seen.push(r));
        assert_eq!(seen, vec![2, 3]);
    }
}
