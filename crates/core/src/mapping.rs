//! Inbound to outbound field id mapping.

use crate::bitset::FieldBitSet;
use alloc::vec::Vec;

/// Maps inbound field ids to the outbound field ids derived from them one to one.
///
/// Built once per schema bind and immutable until the next bind. The inverse table
/// recovers the inbound field that feeds an outbound field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMapping {
    inbound_to_outbound: Vec<Option<usize>>,
    outbound_to_inbound: Vec<Option<usize>>,
}

impl FieldMapping {
    /// Creates a builder.
    pub fn builder() -> FieldMappingBuilder {
        FieldMappingBuilder::default()
    }

    /// Returns the outbound field id fed by `inbound_field_id`, if any.
    #[inline]
    pub fn outbound_field_id(&self, inbound_field_id: usize) -> Option<usize> {
        self.inbound_to_outbound
            .get(inbound_field_id)
            .copied()
            .flatten()
    }

    /// Returns the inbound field id that feeds `outbound_field_id`, if any.
    #[inline]
    pub fn inbound_field_id(&self, outbound_field_id: usize) -> Option<usize> {
        self.outbound_to_inbound
            .get(outbound_field_id)
            .copied()
            .flatten()
    }

    /// Calls `f` with each outbound id mapped from a changed inbound id, in ascending
    /// inbound order. Unmapped inbound ids are skipped.
    pub fn translate_inbound_change_set(&self, changed: &FieldBitSet, mut f: impl FnMut(usize)) {
        for inbound in changed.iter_ones() {
            if let Some(outbound) = self.outbound_field_id(inbound) {
                f(outbound);
            }
        }
    }

    /// Sets the outbound ids mapped from `changed` in `out`.
    pub fn translate_into(&self, changed: &FieldBitSet, out: &mut FieldBitSet) {
        self.translate_inbound_change_set(changed, |id| {
            out.set(id);
        });
    }

    /// Returns the number of inbound slots in the mapping.
    pub fn inbound_len(&self) -> usize {
        self.inbound_to_outbound.len()
    }

    /// Returns true if no inbound field is mapped.
    pub fn is_empty(&self) -> bool {
        self.inbound_to_outbound.iter().all(Option::is_none)
    }
}

/// Builder for [`FieldMapping`].
#[derive(Debug, Default)]
pub struct FieldMappingBuilder {
    inbound_to_outbound: Vec<Option<usize>>,
    outbound_to_inbound: Vec<Option<usize>>,
}

impl FieldMappingBuilder {
    /// Creates a builder sized for `inbound` fields.
    pub fn with_capacity(inbound: usize) -> Self {
        Self {
            inbound_to_outbound: Vec::with_capacity(inbound),
            outbound_to_inbound: Vec::with_capacity(inbound),
        }
    }

    /// Records that `inbound_field_id` feeds `outbound_field_id`.
    pub fn map_inbound_to_outbound(&mut self, inbound_field_id: usize, outbound_field_id: usize) {
        if inbound_field_id >= self.inbound_to_outbound.len() {
            self.inbound_to_outbound.resize(inbound_field_id + 1, None);
        }
        if outbound_field_id >= self.outbound_to_inbound.len() {
            self.outbound_to_inbound.resize(outbound_field_id + 1, None);
        }
        self.inbound_to_outbound[inbound_field_id] = Some(outbound_field_id);
        self.outbound_to_inbound[outbound_field_id] = Some(inbound_field_id);
    }

    /// Builds the mapping.
    pub fn build(self) -> FieldMapping {
        FieldMapping {
            inbound_to_outbound: self.inbound_to_outbound,
            outbound_to_inbound: self.outbound_to_inbound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample() -> FieldMapping {
        let mut builder = FieldMapping::builder();
        builder.map_inbound_to_outbound(0, 3);
        builder.map_inbound_to_outbound(2, 0);
        builder.map_inbound_to_outbound(5, 1);
        builder.build()
    }

    #[test]
    fn test_lookup() {
        let mapping = sample();
        assert_eq!(mapping.outbound_field_id(0), Some(3));
        assert_eq!(mapping.outbound_field_id(1), None);
        assert_eq!(mapping.outbound_field_id(99), None);
        assert_eq!(mapping.inbound_field_id(3), Some(0));
        assert_eq!(mapping.inbound_field_id(2), None);
        assert_eq!(mapping.inbound_len(), 6);
    }

    #[test]
    fn test_translate_skips_unmapped() {
        let mapping = sample();
        let mut seen = vec![];
        mapping.translate_inbound_change_set(&FieldBitSet::from_bits([0, 1, 5]), |id| seen.push(id));
        assert_eq!(seen, vec![3, 1]);

        let mut out = FieldBitSet::new();
        mapping.translate_into(&FieldBitSet::from_bits([2, 4]), &mut out);
        assert_eq!(out, FieldBitSet::from_bits([0]));
    }

    #[test]
    fn test_empty_mapping() {
        let mapping = FieldMapping::default();
        assert!(mapping.is_empty());
        let mut out = FieldBitSet::new();
        mapping.translate_into(&FieldBitSet::from_bits([0, 1]), &mut out);
        assert!(out.is_empty());
    }
}
