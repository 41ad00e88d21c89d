//! The downstream side of an operator edge.

use super::output::TransformOutput;
use alloc::rc::Rc;
use core::cell::RefCell;
use weft_core::{FieldBitSet, RowIndex, Schema};

/// Receives schema and row events from an upstream [`TransformOutput`].
///
/// A `schema_updated(None)` means the upstream has no schema; any state derived
/// from the previous schema must be dropped. Row events only arrive while a
/// schema is present.
pub trait TransformInput {
    /// Called when the input is attached to (`Some`) or detached from (`None`) a source.
    fn set_source(&mut self, source: Option<TransformOutput>) {
        let _ = source;
    }

    /// Called when the upstream schema is replaced.
    fn schema_updated(&mut self, schema: Option<Rc<Schema>>);

    /// Called with rows that were added upstream.
    fn rows_added(&mut self, rows: &[RowIndex]);

    /// Called with rows whose values changed in `changed_fields`.
    fn rows_changed(&mut self, rows: &[RowIndex], changed_fields: &FieldBitSet);

    /// Called with rows that were removed upstream.
    fn rows_removed(&mut self, rows: &[RowIndex]);
}

/// Shared handle to an input, as held by the outputs it is attached to.
pub type InputRef = Rc<RefCell<dyn TransformInput>>;
